//
//  bitbucket-collector
//  api/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # API Client Layer
//!
//! This module provides the HTTP side of the collector: an authenticated,
//! rate-limit aware client for the Bitbucket Cloud REST API (v2.0) and the
//! record types it decodes.
//!
//! ## Architecture
//!
//! The API layer is organized as follows:
//!
//! - [`client`]: Authenticated paginated `GET`s with refresh and backoff
//! - [`cloud`]: Record schemas and per-category constants
//! - [`common`]: Shared types (pagination, errors)
//! - [`ratelimit`]: Retry and rate-limit policies
//! - [`transport`]: The pluggable HTTP seam
//!
//! ## Error Handling
//!
//! API failures surface as [`ClientError`] variants once the client's own
//! recovery is exhausted:
//!
//! - `Http`: non-success status (after one refresh on 401, or backoff on 429/5xx)
//! - `RateLimited`: budget exhausted with sleeping disabled
//! - `Schema`: body does not match the expected envelope or record
//! - `Network`: the request never completed

/// Authenticated HTTP client bound to one repository.
pub mod client;

/// Bitbucket Cloud API v2.0 record schemas.
pub mod cloud;

/// Common types: [`ClientError`], [`PaginatedResponse`](common::PaginatedResponse),
/// [`PageCursor`](common::PageCursor).
pub mod common;

/// Backoff and rate-limit policies.
pub mod ratelimit;

/// The pluggable HTTP transport.
pub mod transport;

pub use client::BitbucketClient;
pub use common::ClientError;
pub use transport::{HttpTransport, Transport};
