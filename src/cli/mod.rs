//
//  bitbucket-collector
//  cli/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! CLI definition using clap derive macros

mod fetch;

use std::path::PathBuf;

use clap::Parser;

/// Fetch issues or pull requests of a Bitbucket Cloud repository as
/// archive items.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bbcollect",
    version,
    about = "Collect Bitbucket Cloud issues and pull requests as JSON archive items",
    long_about = "bbcollect walks the issues or pull requests of a Bitbucket Cloud repository,\n\
                  oldest update first, attaches their comments and writes one JSON archive\n\
                  item per record to stdout.\n\n\
                  Authentication uses an OAuth consumer and a refresh token.",
    after_help = "Logging goes to stderr and is controlled with BBCOLLECT_LOG (e.g. BBCOLLECT_LOG=debug)."
)]
pub struct Cli {
    /// Repository owner (workspace)
    pub owner: String,

    /// Repository slug
    pub repository: String,

    /// Category of items to fetch
    #[arg(long, default_value = "issue", value_parser = ["issue", "pull_request"])]
    pub category: String,

    /// OAuth consumer key
    #[arg(long, short = 'c', env = "BBCOLLECT_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth consumer secret
    #[arg(long = "secret-id", short = 's', env = "BBCOLLECT_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth refresh token
    #[arg(long, short = 'r', env = "BBCOLLECT_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Fetch items updated since this date (YYYY-MM-DD, or RFC 3339)
    #[arg(long)]
    pub from_date: Option<String>,

    /// Stop at the first item updated after this date
    #[arg(long)]
    pub to_date: Option<String>,

    /// Web URL of a self-hosted instance (used for the item origin)
    #[arg(long, env = "BBCOLLECT_ENTERPRISE_URL")]
    pub enterprise_url: Option<String>,

    /// REST API base URL
    #[arg(long, env = "BBCOLLECT_API_URL")]
    pub api_url: Option<String>,

    /// OAuth token endpoint
    #[arg(long, env = "BBCOLLECT_TOKEN_URL")]
    pub token_url: Option<String>,

    /// Sleep until the rate limit resets instead of failing
    #[arg(long)]
    pub sleep_for_rate: bool,

    /// Remaining rate-limit budget that triggers sleeping
    #[arg(long)]
    pub min_rate_to_sleep: Option<u64>,

    /// Items per page
    #[arg(long)]
    pub max_items: Option<u32>,

    /// Retries for 429 and 5xx responses
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base backoff delay in seconds
    #[arg(long)]
    pub sleep_time: Option<u64>,

    /// Do not fetch user data and mark items as filtered
    #[arg(long)]
    pub filter_classified: bool,

    /// Tag for the items (defaults to the origin)
    #[arg(long)]
    pub tag: Option<String>,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub no_ssl_verify: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(long, env = "BBCOLLECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write a pretty JSON array instead of JSON lines
    #[arg(long)]
    pub json: bool,
}
