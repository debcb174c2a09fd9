//
//  bitbucket-collector
//  cli/fetch.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! The fetch command: resolve settings, run the backend, stream items.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use crate::api::HttpTransport;
use crate::auth::Credentials;
use crate::backend::{Backend, BackendSettings, FetchRequest};
use crate::config::Config;
use crate::output::{OutputFormat, OutputWriter};

use super::Cli;

impl Cli {
    /// Runs a collection and writes the items to stdout.
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        let ssl_verify = config.client.ssl_verify && !self.no_ssl_verify;

        let transport = Arc::new(HttpTransport::new(ssl_verify)?);
        let backend = Backend::new(
            &self.owner,
            &self.repository,
            self.credentials(&config),
            transport,
        )
        .with_settings(self.settings(&config));

        let mut stream = backend.fetch_with(
            FetchRequest::new(&self.category)
                .from_date(self.from_date.clone())
                .to_date(self.to_date.clone())
                .filter_classified(self.filter_classified),
        )?;

        let mut writer = OutputWriter::new(io::stdout(), self.output_format());
        let outcome = loop {
            match stream.next().await {
                Ok(Some(item)) => writer.write_item(&item)?,
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        writer.finish()?;

        match &outcome {
            Ok(()) => info!(items = writer.written(), origin = backend.origin(), "Collection finished"),
            Err(err) => error!(items = writer.written(), "Collection aborted: {}", err),
        }
        Ok(outcome?)
    }

    fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => match Config::config_path() {
                Ok(path) => Config::load_from(&path),
                Err(_) => Ok(Config::default()),
            },
        }
    }

    fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::JsonLines
        }
    }

    /// Credentials from the command line (or environment), falling back to
    /// the configuration file.
    pub fn credentials(&self, config: &Config) -> Credentials {
        let pick = |flag: &Option<String>, file: &Option<String>| {
            flag.clone().or_else(|| file.clone()).unwrap_or_default()
        };

        Credentials::new(
            pick(&self.client_id, &config.credentials.client_id),
            pick(&self.client_secret, &config.credentials.client_secret),
            pick(&self.refresh_token, &config.credentials.refresh_token),
        )
    }

    /// Backend settings: command line over configuration file over defaults.
    pub fn settings(&self, config: &Config) -> BackendSettings {
        let mut settings = config.settings();

        if let Some(url) = &self.enterprise_url {
            settings.base_url = Some(url.clone());
        }
        if let Some(url) = &self.api_url {
            settings.api_url = url.clone();
        }
        if let Some(url) = &self.token_url {
            settings.token_url = url.clone();
        }
        if let Some(max_items) = self.max_items {
            settings.max_items = max_items;
        }
        if let Some(max_retries) = self.max_retries {
            settings.retry.max_retries = max_retries;
        }
        if let Some(sleep_time) = self.sleep_time {
            settings.retry.sleep_time = Duration::from_secs(sleep_time);
        }
        if let Some(min_rate) = self.min_rate_to_sleep {
            settings.min_rate_to_sleep = min_rate;
        }
        settings.sleep_for_rate |= self.sleep_for_rate;
        settings.tag = self.tag.clone();

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["bbcollect", "acme", "widgets"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_file_credentials() {
        let mut config = Config::default();
        config.credentials.client_id = Some("file-key".into());
        config.credentials.client_secret = Some("file-secret".into());

        let cli = parse(&["-c", "flag-key"]);
        let credentials = cli.credentials(&config);

        assert_eq!(credentials.client_id, "flag-key");
        assert_eq!(credentials.client_secret, "file-secret");
        assert_eq!(credentials.refresh_token, "");
        assert!(credentials.validate().is_err());
    }

    #[test]
    fn test_flags_override_file_settings() {
        let mut config = Config::default();
        config.client.max_items = 30;
        config.client.sleep_for_rate = true;
        config.client.max_retries = 2;

        let cli = parse(&[
            "--max-items",
            "5",
            "--sleep-time",
            "3",
            "--enterprise-url",
            "https://bitbucket.example.com",
            "--tag",
            "t",
        ]);
        let settings = cli.settings(&config);

        assert_eq!(settings.max_items, 5);
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.retry.sleep_time, Duration::from_secs(3));
        assert!(settings.sleep_for_rate);
        assert_eq!(settings.base_url.as_deref(), Some("https://bitbucket.example.com"));
        assert_eq!(settings.tag.as_deref(), Some("t"));
    }

    #[test]
    fn test_output_format() {
        assert_eq!(parse(&[]).output_format(), OutputFormat::JsonLines);
        assert_eq!(parse(&["--json"]).output_format(), OutputFormat::Json);
    }
}
