//
//  bitbucket-collector
//  api/common/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Common API Types for the Bitbucket Cloud Collector
//!
//! This module provides the pieces shared by every endpoint the collector
//! touches: the client-side error type, the pagination envelope and the
//! cursor used to walk it.
//!
//! # Overview
//!
//! - [`ClientError`] - Failure of an API call after local retries
//! - [`PaginatedResponse`] - One page of a Bitbucket Cloud listing
//! - [`PageCursor`] - Resumable position inside a paginated listing
//! - [`format_api_error`] - Condenses Bitbucket error bodies into a message
//!
//! # Example
//!
//! ```rust
//! use bitbucket_collector::api::common::ClientError;
//!
//! fn describe(err: &ClientError) -> String {
//!     match err.status() {
//!         Some(404) => "gone".to_string(),
//!         Some(code) => format!("http {}", code),
//!         None => err.to_string(),
//!     }
//! }
//!
//! let err = ClientError::RateLimited { reset_in: 30 };
//! assert_eq!(describe(&err), "Rate limit exhausted; resets in 30s");
//! ```

use thiserror::Error;

mod pagination;

pub use pagination::*;

/// Failure of a Bitbucket API call.
///
/// `ClientError` is what the HTTP layer raises once its own recovery
/// (one token refresh on 401, backoff retries on 429/5xx and dropped
/// connections) is exhausted.
///
/// | Variant | Description |
/// |---------|-------------|
/// | `Http` | Non-success status, carries the last status seen |
/// | `RateLimited` | Rate-limit budget exhausted and sleeping disabled |
/// | `Schema` | Response body did not match the expected envelope/record |
/// | `Network` | Transport-level failure (DNS, TLS, connection reset) |
#[derive(Error, Debug)]
pub enum ClientError {
    /// The API answered with a non-success status.
    ///
    /// # Parameters
    ///
    /// - `status` - The HTTP status of the final attempt
    /// - `url` - The requested URL
    /// - `message` - Message extracted from the error body
    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    /// The remaining rate-limit budget dropped to the configured floor while
    /// sleeping for the reset was not allowed.
    #[error("Rate limit exhausted; resets in {reset_in}s")]
    RateLimited { reset_in: u64 },

    /// The body could not be decoded into the expected schema.
    #[error("Malformed response from {url}: {reason}")]
    Schema { url: String, reason: String },

    /// A network-level error occurred during the request.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ClientError {
    /// Returns the HTTP status for [`ClientError::Http`], `429` for
    /// [`ClientError::RateLimited`], `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Schema { .. } | Self::Network(_) => None,
        }
    }

    /// `true` for failures worth retrying: the request never got an answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Builds a [`ClientError::Schema`] from a decoding failure.
    pub fn schema(url: &str, reason: impl ToString) -> Self {
        Self::Schema {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Parses a Bitbucket API error response and extracts a user-friendly message.
///
/// Bitbucket Cloud returns errors in the format:
/// ```json
/// {"type": "error", "error": {"message": "Human readable message"}}
/// ```
///
/// Some endpoints (the OAuth token endpoint among them) use
/// `{"error": "invalid_grant", "error_description": "..."}` instead.
/// If no known shape matches, the raw body is returned (or the bare status
/// when the body is empty).
pub fn format_api_error(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        // Cloud format: {"type": "error", "error": {"message": "..."}}
        if let Some(message) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return message.to_string();
        }

        // OAuth format: {"error": "...", "error_description": "..."}
        if let Some(description) = json.get("error_description").and_then(|m| m.as_str()) {
            return description.to_string();
        }

        if let Some(message) = json.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        format!("status {}", status)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cloud_error() {
        let body = r#"{"type": "error", "error": {"message": "Repository not found"}}"#;
        assert_eq!(format_api_error(404, body), "Repository not found");
    }

    #[test]
    fn test_format_oauth_error() {
        let body = r#"{"error": "invalid_grant", "error_description": "Invalid refresh_token"}"#;
        assert_eq!(format_api_error(400, body), "Invalid refresh_token");
    }

    #[test]
    fn test_format_fallbacks() {
        assert_eq!(format_api_error(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(format_api_error(500, "  "), "status 500");
    }

    #[test]
    fn test_status_mapping() {
        let http = ClientError::Http {
            status: 401,
            url: "u".into(),
            message: "m".into(),
        };
        assert_eq!(http.status(), Some(401));
        assert_eq!(ClientError::RateLimited { reset_in: 1 }.status(), Some(429));
        assert_eq!(ClientError::schema("u", "missing field `values`").status(), None);
    }
}
