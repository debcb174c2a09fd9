//
//  bitbucket-collector
//  config/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration Module
//!
//! Optional TOML configuration for `bbcollect`. Every key can also be given
//! on the command line or through an environment variable, which take
//! precedence over the file.
//!
//! ## Configuration File Location
//!
//! - **Linux**: `~/.config/bbcollect/config.toml`
//! - **macOS**: `~/Library/Application Support/bbcollect/config.toml`
//! - **Windows**: `C:\Users\<User>\AppData\Roaming\bbcollect\config.toml`
//!
//! ## Example Configuration File
//!
//! ```toml
//! [credentials]
//! client_id = "consumer-key"
//! client_secret = "consumer-secret"
//! refresh_token = "refresh-token"
//!
//! [client]
//! max_items = 50
//! max_retries = 5
//! sleep_time = 1
//! max_sleep = 60
//! sleep_for_rate = true
//! min_rate_to_sleep = 10
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bitbucket_collector::config::Config;
//!
//! let config = Config::load()?;
//! let settings = config.settings();
//! println!("page size: {}", settings.max_items);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::client::{DEFAULT_API_URL, DEFAULT_MAX_ITEMS};
use crate::api::ratelimit::{RetryPolicy, DEFAULT_MAX_SLEEP, DEFAULT_SLEEP_TIME, MAX_RETRIES, MIN_RATE_LIMIT};
use crate::auth::TOKEN_URL;
use crate::backend::BackendSettings;
use crate::APP_NAME;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

/// `[credentials]` section. Missing keys must come from the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// `[client]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Web root of a self-hosted instance, used for `origin`.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_max_items")]
    pub max_items: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, in seconds.
    #[serde(default = "default_sleep_time")]
    pub sleep_time: u64,

    /// Backoff cap, in seconds.
    #[serde(default = "default_max_sleep")]
    pub max_sleep: u64,

    #[serde(default)]
    pub sleep_for_rate: bool,

    #[serde(default = "default_min_rate_to_sleep")]
    pub min_rate_to_sleep: u64,

    #[serde(default = "default_ssl_verify")]
    pub ssl_verify: bool,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_token_url() -> String {
    TOKEN_URL.to_string()
}

fn default_max_items() -> u32 {
    DEFAULT_MAX_ITEMS
}

fn default_max_retries() -> u32 {
    MAX_RETRIES
}

fn default_sleep_time() -> u64 {
    DEFAULT_SLEEP_TIME
}

fn default_max_sleep() -> u64 {
    DEFAULT_MAX_SLEEP
}

fn default_min_rate_to_sleep() -> u64 {
    MIN_RATE_LIMIT
}

fn default_ssl_verify() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_url: default_api_url(),
            token_url: default_token_url(),
            max_items: default_max_items(),
            max_retries: default_max_retries(),
            sleep_time: default_sleep_time(),
            max_sleep: default_max_sleep(),
            sleep_for_rate: false,
            min_rate_to_sleep: default_min_rate_to_sleep(),
            ssl_verify: default_ssl_verify(),
        }
    }
}

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads the configuration from `path`. A missing file yields the
    /// defaults; an unreadable or malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Gets the path to the configuration file.
    pub fn config_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", APP_NAME)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Backend settings described by the `[client]` section.
    pub fn settings(&self) -> BackendSettings {
        let client = &self.client;
        BackendSettings {
            base_url: client.base_url.clone(),
            api_url: client.api_url.clone(),
            token_url: client.token_url.clone(),
            max_items: client.max_items,
            retry: RetryPolicy {
                max_retries: client.max_retries,
                sleep_time: Duration::from_secs(client.sleep_time),
                max_sleep: Duration::from_secs(client.max_sleep),
            },
            sleep_for_rate: client.sleep_for_rate,
            min_rate_to_sleep: client.min_rate_to_sleep,
            tag: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert!(config.credentials.client_id.is_none());
        assert_eq!(config.client.max_items, 50);
        assert_eq!(config.client.token_url, TOKEN_URL);
        assert!(config.client.ssl_verify);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[credentials]
client_id = "key"
refresh_token = "rt"

[client]
max_items = 20
sleep_for_rate = true
sleep_time = 2
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.credentials.client_id.as_deref(), Some("key"));
        assert!(config.credentials.client_secret.is_none());

        let settings = config.settings();
        assert_eq!(settings.max_items, 20);
        assert!(settings.sleep_for_rate);
        assert_eq!(settings.retry.sleep_time, Duration::from_secs(2));
        assert_eq!(settings.retry.max_retries, 5);
        assert_eq!(settings.min_rate_to_sleep, 10);
        assert_eq!(settings.api_url, "https://api.bitbucket.org/2.0");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[client]\nmax_items = \"many\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[test]
    fn test_config_path_ends_with_file_name() {
        if let Ok(path) = Config::config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
