//
//  bitbucket-collector
//  lib.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Bitbucket Collector Library
//!
//! Incremental collection of Bitbucket Cloud issues and pull requests for
//! software-analytics pipelines.
//!
//! ## Overview
//!
//! The library walks the issues or pull requests of one repository, oldest
//! update first, attaches every comment (plus activity and commits for pull
//! requests) and wraps each record into a timestamped, checksummed
//! [`ArchiveItem`]. Runs can resume from any date, since the listing is
//! filtered on `updated_on`.
//!
//! ## Features
//!
//! - **OAuth 2.0**: refresh-token exchange with automatic renewal
//! - **Lazy pagination**: one page in flight at a time, nothing prefetched
//! - **Resilience**: token refresh on 401, backoff on 429/5xx and network failures, rate-limit budget tracking
//! - **Stable identities**: item uuids depend only on origin, category and id
//! - **Pluggable transport**: every request goes through the [`Transport`](api::Transport) trait
//!
//! ## Module Structure
//!
//! - [`backend`]: Validation and archive-item wrapping (entry point)
//! - [`fetcher`]: Per-category merging of parents and nested data
//! - [`api`]: HTTP client, transport, retry policies, record schemas
//! - [`auth`]: OAuth credentials and token management
//! - [`config`]: Configuration file management
//! - [`cli`]: Command-line interface definitions using clap
//! - [`output`]: JSON / JSON Lines output
//! - [`error`]: Error taxonomy
//! - [`util`]: Utility functions
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bitbucket_collector::{Backend, Credentials};
//! use bitbucket_collector::api::HttpTransport;
//!
//! let transport = Arc::new(HttpTransport::new(true)?);
//! let credentials = Credentials::new("key", "secret", "refresh-token");
//! let backend = Backend::new("atlassian", "python-bitbucket", credentials, transport);
//!
//! let mut items = backend.fetch("pull_request", Some("2024-01-01"))?;
//! while let Some(item) = items.next().await? {
//!     println!("{}", serde_json::to_string(&item)?);
//! }
//! ```

pub mod api;

pub mod auth;

pub mod backend;

pub mod cli;

pub mod config;

pub mod error;

pub mod fetcher;

pub mod output;

pub mod util;

pub use api::cloud::Category;

pub use auth::Credentials;

pub use backend::{ArchiveItem, Backend};

pub use cli::Cli;

pub use config::Config;

pub use error::{Error, Result};

/// Application name, used for the configuration directory.
pub const APP_NAME: &str = "bbcollect";

/// Process exit codes.
///
/// Codes are powers of two so wrapper scripts can test them as flags.
pub mod exit_codes {
    use crate::error::Error;

    /// Collection completed.
    pub const SUCCESS: i32 = 0;

    /// Generic failure.
    pub const ERROR: i32 = 1;

    /// Invalid arguments or configuration.
    pub const USAGE: i32 = 2;

    /// The OAuth token exchange failed.
    pub const AUTH_ERROR: i32 = 4;

    /// The repository (or one of its resources) does not exist.
    pub const NOT_FOUND: i32 = 8;

    /// Rate limit exhausted.
    pub const RATE_LIMIT: i32 = 32;

    /// Maps a failure to its exit code.
    pub fn for_error(err: &anyhow::Error) -> i32 {
        match err.downcast_ref::<Error>() {
            Some(Error::Validation(_)) => USAGE,
            Some(Error::Authentication(_)) => AUTH_ERROR,
            Some(err @ Error::Client(_)) => match err.status() {
                Some(404) => NOT_FOUND,
                Some(429) => RATE_LIMIT,
                _ => ERROR,
            },
            None => ERROR,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::api::common::ClientError;

        #[test]
        fn test_for_error() {
            let err = anyhow::Error::new(Error::validation("bad category"));
            assert_eq!(for_error(&err), USAGE);

            let err = anyhow::Error::new(Error::Authentication("nope".into()));
            assert_eq!(for_error(&err), AUTH_ERROR);

            let err = anyhow::Error::new(Error::from(ClientError::Http {
                status: 404,
                url: "u".into(),
                message: "Repository not found".into(),
            }));
            assert_eq!(for_error(&err), NOT_FOUND);

            let err = anyhow::Error::new(Error::from(ClientError::RateLimited { reset_in: 5 }));
            assert_eq!(for_error(&err), RATE_LIMIT);

            assert_eq!(for_error(&anyhow::anyhow!("disk full")), ERROR);
        }
    }
}
