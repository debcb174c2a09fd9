//
//  bitbucket-collector
//  auth/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authentication Module
//!
//! Bitbucket Cloud mining runs authenticate with an OAuth 2.0 consumer and a
//! long-lived refresh token. The refresh token is exchanged for short-lived
//! access tokens on demand, and every API request carries the current access
//! token as a bearer credential.
//!
//! ## Module Structure
//!
//! - [`Credentials`]: the consumer key/secret, refresh token and the current
//!   access token with its expiry
//! - [`AuthCredential`]: what gets attached to a single HTTP request
//! - [`TokenManager`]: owns the credentials for a run and refreshes them
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bitbucket_collector::api::HttpTransport;
//! use bitbucket_collector::auth::{Credentials, TokenManager};
//!
//! let credentials = Credentials::new("consumer-key", "consumer-secret", "refresh-token");
//! let mut tokens = TokenManager::new(credentials, Arc::new(HttpTransport::new(true)?));
//! let bearer = tokens.get_access_token().await?;
//! ```

mod oauth;

pub use oauth::*;

use std::fmt;

use reqwest::RequestBuilder;

use crate::error::{Error, Result};

/// Credential attached to a single HTTP request.
///
/// # Variants
///
/// - `Bearer`: OAuth 2.0 access token, used for every API call
/// - `Basic`: consumer key and secret, used only against the token endpoint
#[derive(Clone, PartialEq, Eq)]
pub enum AuthCredential {
    /// OAuth 2.0 access token.
    Bearer {
        /// The access token sent as `Authorization: Bearer <token>`.
        token: String,
    },
    /// HTTP Basic authentication.
    Basic {
        /// The username (the OAuth consumer key).
        username: String,
        /// The password (the OAuth consumer secret).
        password: String,
    },
}

impl AuthCredential {
    /// Creates a bearer credential.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates a basic credential.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Applies this credential to an HTTP request builder.
    ///
    /// # Parameters
    ///
    /// * `request` - The `reqwest::RequestBuilder` to add authentication to.
    ///
    /// # Returns
    ///
    /// The modified `RequestBuilder` with the `Authorization` header set.
    pub fn apply_to_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer { token } => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// OAuth 2.0 credentials for one collection run.
///
/// `client_id`, `client_secret` and `refresh_token` never change during a
/// run. `access_token` and `expiry` (epoch seconds) are replaced in place
/// by [`TokenManager::refresh`]; a refresh token rotated by the server is
/// not adopted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub access_token: Option<String>,
    pub expiry: Option<i64>,
}

impl Credentials {
    /// Creates credentials with no access token yet.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: refresh_token.into(),
            access_token: None,
            expiry: None,
        }
    }

    /// Seeds a previously issued access token.
    pub fn with_access_token(mut self, access_token: impl Into<String>, expiry: Option<i64>) -> Self {
        self.access_token = Some(access_token.into());
        self.expiry = expiry;
        self
    }

    /// Checks that every long-lived part of the credentials is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::validation(format!("missing OAuth credential: {}", name)));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("expiry", &self.expiry)
            .finish()
    }
}
