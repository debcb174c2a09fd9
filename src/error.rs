//
//  bitbucket-collector
//  error.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Top-level error taxonomy for a collection run.
//!
//! Every fallible operation of the library returns [`Result`]. The three
//! variants of [`Error`] map one-to-one onto how a run ends:
//!
//! | Variant | Raised by | Effect |
//! |---------|-----------|--------|
//! | `Authentication` | token exchange | run aborts immediately |
//! | `Client` | HTTP layer after retries, malformed envelopes | category fetch aborts, earlier items stay delivered |
//! | `Validation` | argument checks | run never starts, no network traffic |

use thiserror::Error;

use crate::api::common::ClientError;

/// Errors surfaced by the collector.
#[derive(Error, Debug)]
pub enum Error {
    /// The OAuth2 token endpoint refused the credentials, was unreachable,
    /// or answered with something that is not a token response.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An API call failed after the client exhausted its retries, or the
    /// response did not match the expected schema.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A caller-supplied argument was rejected before any request was made.
    #[error("Invalid argument: {0}")]
    Validation(String),
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status carried by a client error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Client(err) => err.status(),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
