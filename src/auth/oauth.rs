//
//  bitbucket-collector
//  auth/oauth.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! OAuth 2.0 refresh-token exchange for Bitbucket Cloud.
//!
//! Bitbucket Cloud access tokens are valid for two hours. A mining run
//! outlives that easily, so the [`TokenManager`] renews the access token
//! whenever it is missing or about to expire, and on demand when the API
//! rejects it.
//!
//! # Token Exchange
//!
//! ```text
//! POST https://bitbucket.org/site/oauth2/access_token
//! Authorization: Basic base64(client_id:client_secret)
//!
//! grant_type=refresh_token&refresh_token=<refresh_token>
//! ```
//!
//! answered by
//!
//! ```json
//! {"access_token": "...", "expires_in": 7200, "token_type": "bearer", "refresh_token": "..."}
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use super::{AuthCredential, Credentials};
use crate::api::common::format_api_error;
use crate::api::transport::{HttpRequest, Transport};
use crate::error::{Error, Result};

/// Bitbucket OAuth token endpoint URL.
pub const TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";

/// A token expiring within this many seconds is treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Raw token response from Bitbucket OAuth endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponseRaw {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scopes: Option<String>,
}

/// Owns the OAuth credentials of a run and keeps the access token fresh.
///
/// There is exactly one `TokenManager` per run. It is owned by the
/// [`BitbucketClient`](crate::api::BitbucketClient), which hands it out
/// mutably, so no locking is involved.
pub struct TokenManager {
    credentials: Credentials,
    token_url: String,
    transport: Arc<dyn Transport>,
    refreshes: u32,
}

impl TokenManager {
    /// Creates a manager for `credentials` that exchanges tokens at
    /// [`TOKEN_URL`].
    pub fn new(credentials: Credentials, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials,
            token_url: TOKEN_URL.to_string(),
            transport,
            refreshes: 0,
        }
    }

    /// Overrides the token endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    /// Current credentials, including the latest access token.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Number of successful refreshes performed so far.
    pub fn refresh_count(&self) -> u32 {
        self.refreshes
    }

    /// Whether the access token must be renewed at `now` (epoch seconds).
    ///
    /// A missing token is expired. A token without a known expiry is
    /// trusted until the API rejects it.
    pub fn is_expired_at(&self, now: i64) -> bool {
        match (&self.credentials.access_token, self.credentials.expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => now + EXPIRY_MARGIN_SECS >= expiry,
            (Some(_), None) => false,
        }
    }

    /// Returns a bearer token that is valid for at least the safety margin,
    /// refreshing first when needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] when a required refresh fails.
    pub async fn get_access_token(&mut self) -> Result<String> {
        if self.is_expired_at(Utc::now().timestamp()) {
            self.refresh().await?;
        }

        self.credentials
            .access_token
            .clone()
            .ok_or_else(|| Error::Authentication("no access token available".to_string()))
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// On success `access_token` and `expiry` are replaced in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the endpoint is unreachable,
    /// answers with a non-success status, or returns a body that is not a
    /// token response.
    pub async fn refresh(&mut self) -> Result<()> {
        debug!(token_url = %self.token_url, "Refreshing OAuth access token");

        let form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            (
                "refresh_token".to_string(),
                self.credentials.refresh_token.clone(),
            ),
        ];
        let request = HttpRequest::post_form(&self.token_url, form).auth(AuthCredential::basic(
            &self.credentials.client_id,
            &self.credentials.client_secret,
        ));

        let response = self
            .transport
            .send(&request)
            .await
            .map_err(|e| Error::Authentication(format!("Failed to refresh token: {}", e)))?;

        if !response.is_success() {
            return Err(Error::Authentication(format!(
                "Token refresh failed ({}): {}",
                response.status,
                format_api_error(response.status, &response.body)
            )));
        }

        let token: TokenResponseRaw = serde_json::from_str(&response.body)
            .map_err(|e| Error::Authentication(format!("Failed to parse token response: {}", e)))?;

        self.credentials.access_token = Some(token.access_token);
        self.credentials.expiry = token
            .expires_in
            .map(|secs| Utc::now().timestamp() + secs as i64);
        self.refreshes += 1;

        debug!(
            expires_in = ?token.expires_in,
            scopes = token.scopes.as_deref().unwrap_or(""),
            "Access token refreshed"
        );
        Ok(())
    }
}
