//
//  bitbucket-collector
//  api/ratelimit.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Retry and rate-limit policies for API calls.
//!
//! Two independent mechanisms protect a long mining run:
//!
//! - [`RetryPolicy`] reacts *after* a response: 429 and 5xx statuses are
//!   retried with exponential backoff.
//! - [`RateLimitHandler`] acts *before* a request: it tracks the
//!   `X-RateLimit-Remaining` / `X-RateLimit-Reset` headers and either sleeps
//!   until the window resets or fails fast.

use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use super::common::ClientError;
use super::transport::HttpResponse;

/// Default number of retries for a transient failure.
pub const MAX_RETRIES: u32 = 5;

/// Default base delay between retries, in seconds.
pub const DEFAULT_SLEEP_TIME: u64 = 1;

/// Default upper bound for a single backoff delay, in seconds.
pub const DEFAULT_MAX_SLEEP: u64 = 60;

/// Default remaining-budget floor below which the handler kicks in.
pub const MIN_RATE_LIMIT: u64 = 10;

const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";
const RETRY_AFTER_HEADER: &str = "retry-after";

/// Exponential backoff for transient HTTP failures.
///
/// The delay before retry `n` (0-based) is `sleep_time * 2^n`, capped at
/// `max_sleep`. A `Retry-After` header, when present, replaces the computed
/// delay but is still capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub sleep_time: Duration,
    pub max_sleep: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            sleep_time: Duration::from_secs(DEFAULT_SLEEP_TIME),
            max_sleep: Duration::from_secs(DEFAULT_MAX_SLEEP),
        }
    }
}

impl RetryPolicy {
    /// Statuses worth retrying: 429 and every 5xx.
    pub fn is_retryable(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = match retry_after {
            Some(delay) => delay,
            None => {
                let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
                self.sleep_time.saturating_mul(factor)
            }
        };
        delay.min(self.max_sleep)
    }

    /// Parses a `Retry-After` header given in seconds.
    pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
        response
            .header(RETRY_AFTER_HEADER)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Tracks the API rate-limit budget between requests.
#[derive(Debug, Clone)]
pub struct RateLimitHandler {
    sleep_for_rate: bool,
    min_rate_to_sleep: u64,
    remaining: Option<u64>,
    reset_at: Option<i64>,
}

impl Default for RateLimitHandler {
    fn default() -> Self {
        Self::new(false, MIN_RATE_LIMIT)
    }
}

impl RateLimitHandler {
    /// Creates a handler.
    ///
    /// # Parameters
    ///
    /// - `sleep_for_rate` - Sleep until the window resets instead of failing
    /// - `min_rate_to_sleep` - Remaining-budget floor that triggers the handler
    pub fn new(sleep_for_rate: bool, min_rate_to_sleep: u64) -> Self {
        Self {
            sleep_for_rate,
            min_rate_to_sleep,
            remaining: None,
            reset_at: None,
        }
    }

    /// Last remaining budget reported by the API.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Records the rate-limit headers of a response. Responses without
    /// them leave the known state untouched.
    pub fn update(&mut self, response: &HttpResponse) {
        if let Some(remaining) = response
            .header(REMAINING_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.remaining = Some(remaining);
        }
        if let Some(reset) = response
            .header(RESET_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            self.reset_at = Some(reset);
        }
    }

    /// Decides what must happen before the next request at `now`
    /// (epoch seconds): `Ok(None)` to proceed, `Ok(Some(delay))` to sleep
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RateLimited`] when the budget is exhausted and
    /// sleeping is disabled.
    pub fn wait_needed(&self, now: i64) -> Result<Option<Duration>, ClientError> {
        let Some(remaining) = self.remaining else {
            return Ok(None);
        };
        if remaining > self.min_rate_to_sleep {
            return Ok(None);
        }

        let reset_in = self
            .reset_at
            .map(|reset| reset.saturating_sub(now).saturating_add(1).max(0) as u64)
            .unwrap_or(0);

        if self.sleep_for_rate {
            Ok(Some(Duration::from_secs(reset_in)))
        } else {
            Err(ClientError::RateLimited { reset_in })
        }
    }

    /// Sleeps until the rate-limit window resets when the budget is low.
    pub async fn sleep_for_rate_limit(&mut self) -> Result<(), ClientError> {
        if let Some(delay) = self.wait_needed(Utc::now().timestamp())? {
            warn!(
                remaining = ?self.remaining,
                seconds = delay.as_secs(),
                "Rate limit budget low, waiting for reset"
            );
            tokio::time::sleep(delay).await;
            self.remaining = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4, None), Duration::from_secs(16));
        assert_eq!(policy.delay_for(6, None), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40, None), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_after_overrides_and_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(3, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(3600))),
            Duration::from_secs(60)
        );

        let response = HttpResponse::new(429, "").with_header("Retry-After", "7");
        assert_eq!(RetryPolicy::retry_after(&response), Some(Duration::from_secs(7)));
        let response = HttpResponse::new(429, "").with_header("Retry-After", "soon");
        assert_eq!(RetryPolicy::retry_after(&response), None);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(RetryPolicy::is_retryable(429));
        assert!(RetryPolicy::is_retryable(500));
        assert!(RetryPolicy::is_retryable(503));
        assert!(!RetryPolicy::is_retryable(401));
        assert!(!RetryPolicy::is_retryable(404));
    }

    #[test]
    fn test_handler_proceeds_without_headers() {
        let handler = RateLimitHandler::default();
        assert!(handler.wait_needed(0).unwrap().is_none());
    }

    #[test]
    fn test_handler_fails_fast_when_exhausted() {
        let mut handler = RateLimitHandler::new(false, 10);
        handler.update(
            &HttpResponse::new(200, "")
                .with_header("X-RateLimit-Remaining", "3")
                .with_header("X-RateLimit-Reset", "1000"),
        );
        assert_eq!(handler.remaining(), Some(3));

        match handler.wait_needed(990) {
            Err(ClientError::RateLimited { reset_in }) => assert_eq!(reset_in, 11),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_handler_sleeps_when_enabled() {
        let mut handler = RateLimitHandler::new(true, 10);
        handler.update(
            &HttpResponse::new(200, "")
                .with_header("X-RateLimit-Remaining", "10")
                .with_header("X-RateLimit-Reset", "1000"),
        );
        assert_eq!(handler.wait_needed(995).unwrap(), Some(Duration::from_secs(6)));

        handler.update(&HttpResponse::new(200, "").with_header("X-RateLimit-Remaining", "11"));
        assert_eq!(handler.wait_needed(995).unwrap(), None);
    }

    #[test]
    fn test_extreme_reset_headers_do_not_overflow() {
        let mut handler = RateLimitHandler::new(false, 10);
        handler.update(
            &HttpResponse::new(200, "")
                .with_header("X-RateLimit-Remaining", "0")
                .with_header("X-RateLimit-Reset", i64::MIN.to_string()),
        );
        match handler.wait_needed(1_700_000_000) {
            Err(ClientError::RateLimited { reset_in }) => assert_eq!(reset_in, 0),
            other => panic!("unexpected: {:?}", other),
        }

        handler.update(&HttpResponse::new(200, "").with_header("X-RateLimit-Reset", i64::MAX.to_string()));
        match handler.wait_needed(-5) {
            Err(ClientError::RateLimited { reset_in }) => assert_eq!(reset_in, i64::MAX as u64),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
