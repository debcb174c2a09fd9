//
//  bitbucket-collector
//  util/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Utility Module
//!
//! Small helpers shared by the backend, the configuration layer and the CLI.
//!
//! ## Categories
//!
//! - **Time Utilities**: [`parse_datetime`], [`datetime_to_epoch`],
//!   [`default_datetime`], [`default_last_datetime`]
//! - **URL Utilities**: [`urijoin`], [`validate_url`]
//! - **Identity**: [`uuid`]
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_collector::util::{parse_datetime, urijoin, uuid};
//!
//! let since = parse_datetime("2024-01-31").unwrap();
//! assert_eq!(since.to_rfc3339(), "2024-01-31T00:00:00+00:00");
//!
//! let origin = urijoin(&["https://bitbucket.org/", "atlassian", "python-bitbucket"]);
//! assert_eq!(origin, "https://bitbucket.org/atlassian/python-bitbucket");
//!
//! assert_eq!(uuid(&["a", "b"]).len(), 64);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::{Error, Result};

/// Lower bound of every fetch: the Unix epoch.
pub fn default_datetime() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Upper bound used when no `to_date` is given.
pub fn default_last_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Parses a user-supplied date.
///
/// Accepted forms:
///
/// | Input | Meaning |
/// |-------|---------|
/// | `2024-01-31T10:00:00+02:00` | RFC 3339, converted to UTC |
/// | `2024-01-31T10:00:00` | naive, taken as UTC |
/// | `2024-01-31 10:00:00` | naive, taken as UTC |
/// | `2024-01-31` | midnight UTC |
///
/// # Errors
///
/// Returns [`Error::Validation`] for anything else.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(Error::validation(format!("invalid date '{}'", input)))
}

/// Converts a timestamp to fractional epoch seconds.
pub fn datetime_to_epoch(dt: &DateTime<Utc>) -> f64 {
    dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0
}

/// Joins URL segments with single slashes.
pub fn urijoin(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Checks that `value` is an absolute `http(s)` URL.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming `what` otherwise.
pub fn validate_url(what: &str, value: &str) -> Result<()> {
    let parsed = Url::parse(value)
        .map_err(|e| Error::validation(format!("invalid {} '{}': {}", what, value, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::validation(format!(
            "invalid {} '{}': unsupported scheme '{}'",
            what, value, scheme
        ))),
    }
}

/// Deterministic identifier: SHA-256 (hex) of the parts joined with `:`.
pub fn uuid(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(":").as_bytes());
    format!("{:x}", hasher.finalize())
}
