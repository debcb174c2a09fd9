//
//  bitbucket-collector
//  backend/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Bitbucket Backend
//!
//! The backend is the entry point of a collection run. It validates the
//! request, wires a [`BitbucketClient`] to a fresh [`TokenManager`], picks
//! the fetcher for the requested category and wraps every merged record
//! into an [`ArchiveItem`].
//!
//! ## Archive Items
//!
//! | Field | Value |
//! |-------|-------|
//! | `backend_name` | `Bitbucket` |
//! | `backend_version` | crate version |
//! | `timestamp` | when the item was produced, epoch seconds |
//! | `origin` | `https://bitbucket.org/<owner>/<repository>` |
//! | `uuid` | SHA-256 of `origin:category:id` |
//! | `updated_on` | the record's `updated_on`, epoch seconds |
//! | `category` | `issue` or `pull_request` |
//! | `search_fields` | `item_id`, `owner`, `repo` |
//! | `tag` | user tag, defaults to `origin` |
//! | `data` | the merged record |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bitbucket_collector::api::HttpTransport;
//! use bitbucket_collector::auth::Credentials;
//! use bitbucket_collector::backend::Backend;
//!
//! let transport = Arc::new(HttpTransport::new(true)?);
//! let credentials = Credentials::new("key", "secret", "refresh");
//! let backend = Backend::new("atlassian", "python-bitbucket", credentials, transport);
//!
//! let mut items = backend.fetch("issue", Some("2024-01-01"))?;
//! while let Some(item) = items.next().await? {
//!     println!("{} {}", item.uuid, item.updated_on);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::api::client::{DEFAULT_API_URL, DEFAULT_MAX_ITEMS};
use crate::api::cloud::Category;
use crate::api::ratelimit::{RateLimitHandler, RetryPolicy, MIN_RATE_LIMIT};
use crate::api::{BitbucketClient, Transport};
use crate::auth::{Credentials, TokenManager, TOKEN_URL};
use crate::error::{Error, Result};
use crate::fetcher::{ItemFetcher, MergedItem};
use crate::util;

/// Name stamped on every archive item.
pub const BACKEND_NAME: &str = "Bitbucket";

/// Version stamped on every archive item.
pub const BACKEND_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Web root used to build `origin` when no enterprise URL is set.
pub const BITBUCKET_URL: &str = "https://bitbucket.org/";

/// Members holding personal data in items of `category`, left out when
/// classified fields are filtered.
pub fn classified_fields(category: Category) -> Vec<String> {
    category
        .user_fields()
        .iter()
        .map(|field| format!("{}_data", field))
        .chain(std::iter::once(format!("{}.user_data", category.comments_field())))
        .collect()
}

/// Tunables of a run. Everything has a sensible default.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Web root of the Bitbucket instance, used for `origin`.
    pub base_url: Option<String>,
    /// REST API root.
    pub api_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// Page size.
    pub max_items: u32,
    /// Backoff for 429, 5xx and dropped connections.
    pub retry: RetryPolicy,
    /// Sleep until the rate-limit window resets instead of failing.
    pub sleep_for_rate: bool,
    /// Remaining-budget floor.
    pub min_rate_to_sleep: u64,
    /// Tag for archive items; `origin` when unset.
    pub tag: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            api_url: DEFAULT_API_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            max_items: DEFAULT_MAX_ITEMS,
            retry: RetryPolicy::default(),
            sleep_for_rate: false,
            min_rate_to_sleep: MIN_RATE_LIMIT,
            tag: None,
        }
    }
}

/// One fetch request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub category: String,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub filter_classified: bool,
}

impl FetchRequest {
    /// Fetch everything of `category`.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            from_date: None,
            to_date: None,
            filter_classified: false,
        }
    }

    pub fn from_date(mut self, from_date: Option<String>) -> Self {
        self.from_date = from_date;
        self
    }

    pub fn to_date(mut self, to_date: Option<String>) -> Self {
        self.to_date = to_date;
        self
    }

    pub fn filter_classified(mut self, filter: bool) -> Self {
        self.filter_classified = filter;
        self
    }
}

/// A merged record wrapped with provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveItem {
    pub backend_name: String,
    pub backend_version: String,
    pub timestamp: f64,
    pub origin: String,
    pub uuid: String,
    pub updated_on: f64,
    pub category: Category,
    pub search_fields: BTreeMap<String, String>,
    pub tag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classified_fields_filtered: Option<Vec<String>>,
    pub data: MergedItem,
}

/// Identity shared by the backend and the streams it starts.
#[derive(Debug, Clone)]
struct Provenance {
    owner: String,
    repository: String,
    origin: String,
    tag: String,
}

impl Provenance {
    fn search_fields(&self, item: &MergedItem) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("item_id".to_string(), Backend::metadata_id(item)),
            ("owner".to_string(), self.owner.clone()),
            ("repo".to_string(), self.repository.clone()),
        ])
    }

    fn archive(&self, item: MergedItem, filter_classified: bool) -> ArchiveItem {
        let id = Backend::metadata_id(&item);
        let category = Backend::metadata_category(&item);

        ArchiveItem {
            backend_name: BACKEND_NAME.to_string(),
            backend_version: BACKEND_VERSION.to_string(),
            timestamp: util::datetime_to_epoch(&Utc::now()),
            origin: self.origin.clone(),
            uuid: util::uuid(&[&self.origin, category.as_str(), &id]),
            updated_on: Backend::metadata_updated_on(&item),
            category,
            search_fields: self.search_fields(&item),
            tag: self.tag.clone(),
            classified_fields_filtered: filter_classified
                .then(|| classified_fields(category)),
            data: item,
        }
    }
}

/// Collector for the issues and pull requests of one repository.
pub struct Backend {
    provenance: Provenance,
    credentials: Credentials,
    settings: BackendSettings,
    transport: Arc<dyn Transport>,
}

impl Backend {
    /// Creates a backend with default settings.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let owner = owner.into();
        let repository = repository.into();
        let settings = BackendSettings::default();
        let origin = Self::origin_for(&settings, &owner, &repository);

        Self {
            provenance: Provenance {
                tag: origin.clone(),
                owner,
                repository,
                origin,
            },
            credentials,
            settings,
            transport,
        }
    }

    /// Replaces the settings, recomputing `origin` and `tag`.
    pub fn with_settings(mut self, settings: BackendSettings) -> Self {
        let origin = Self::origin_for(&settings, &self.provenance.owner, &self.provenance.repository);
        self.provenance.tag = settings.tag.clone().unwrap_or_else(|| origin.clone());
        self.provenance.origin = origin;
        self.settings = settings;
        self
    }

    fn origin_for(settings: &BackendSettings, owner: &str, repository: &str) -> String {
        let base = settings.base_url.as_deref().unwrap_or(BITBUCKET_URL);
        util::urijoin(&[base, owner, repository])
    }

    pub fn origin(&self) -> &str {
        &self.provenance.origin
    }

    pub fn tag(&self) -> &str {
        &self.provenance.tag
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Categories this backend can fetch.
    pub fn categories() -> &'static [Category] {
        &Category::ALL
    }

    /// Starts fetching `category` records updated at or after `from_date`.
    ///
    /// Shorthand for [`fetch_with`](Self::fetch_with).
    pub fn fetch(&self, category: &str, from_date: Option<&str>) -> Result<ItemStream> {
        self.fetch_with(FetchRequest::new(category).from_date(from_date.map(str::to_string)))
    }

    /// Validates `request` and returns a lazy stream of archive items.
    ///
    /// Nothing is sent over the network until the stream is polled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the category is unknown, a date
    /// cannot be parsed, `from_date` is later than `to_date`, credentials
    /// are missing, a URL is malformed or `max_items` is zero.
    pub fn fetch_with(&self, request: FetchRequest) -> Result<ItemStream> {
        let category: Category = request.category.parse()?;

        let from_date = match request.from_date.as_deref() {
            Some(value) => util::parse_datetime(value)
                .map_err(|_| Error::validation(format!("invalid from_date '{}'", value)))?,
            None => util::default_datetime(),
        };
        let to_date = match request.to_date.as_deref() {
            Some(value) => util::parse_datetime(value)
                .map_err(|_| Error::validation(format!("invalid to_date '{}'", value)))?,
            None => util::default_last_datetime(),
        };
        if from_date > to_date {
            return Err(Error::validation(format!(
                "from_date {} is later than to_date {}",
                from_date.to_rfc3339(),
                to_date.to_rfc3339()
            )));
        }

        self.validate()?;

        info!(
            origin = %self.provenance.origin,
            category = %category,
            from_date = %from_date.to_rfc3339(),
            "Fetching items"
        );

        let since = (from_date > util::default_datetime()).then_some(from_date);
        let fetcher = ItemFetcher::new(self.build_client(), category, since)
            .until(to_date)
            .exclude_user_data(request.filter_classified);

        Ok(ItemStream {
            fetcher,
            provenance: self.provenance.clone(),
            filter_classified: request.filter_classified,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.provenance.owner.trim().is_empty() {
            return Err(Error::validation("owner must not be empty"));
        }
        if self.provenance.repository.trim().is_empty() {
            return Err(Error::validation("repository must not be empty"));
        }
        self.credentials.validate()?;

        util::validate_url("api_url", &self.settings.api_url)?;
        util::validate_url("token_url", &self.settings.token_url)?;
        if let Some(base_url) = &self.settings.base_url {
            util::validate_url("base_url", base_url)?;
        }
        if self.settings.max_items == 0 {
            return Err(Error::validation("max_items must be greater than zero"));
        }
        Ok(())
    }

    fn build_client(&self) -> BitbucketClient {
        let tokens = TokenManager::new(self.credentials.clone(), self.transport.clone())
            .with_token_url(&self.settings.token_url);

        BitbucketClient::new(
            &self.provenance.owner,
            &self.provenance.repository,
            tokens,
            self.transport.clone(),
        )
        .with_base_url(&self.settings.api_url)
        .with_max_items(self.settings.max_items)
        .with_retry_policy(self.settings.retry.clone())
        .with_rate_limit(RateLimitHandler::new(
            self.settings.sleep_for_rate,
            self.settings.min_rate_to_sleep,
        ))
    }

    /// Identifier of an item: its numeric id as a string.
    pub fn metadata_id(item: &MergedItem) -> String {
        item.id().to_string()
    }

    /// Update time of an item as epoch seconds.
    pub fn metadata_updated_on(item: &MergedItem) -> f64 {
        util::datetime_to_epoch(&item.updated_on())
    }

    /// Category of an item: the category it was fetched under.
    pub fn metadata_category(item: &MergedItem) -> Category {
        item.category
    }

    /// Search fields of an item for this backend.
    pub fn search_fields(&self, item: &MergedItem) -> BTreeMap<String, String> {
        self.provenance.search_fields(item)
    }
}

/// Lazy stream of archive items produced by [`Backend::fetch`].
pub struct ItemStream {
    fetcher: ItemFetcher,
    provenance: Provenance,
    filter_classified: bool,
}

impl ItemStream {
    /// The category being fetched.
    pub fn category(&self) -> Category {
        self.fetcher.category()
    }

    /// Yields the next archive item, `None` once exhausted.
    ///
    /// The first error ends the stream; items yielded before it remain valid.
    pub async fn next(&mut self) -> Result<Option<ArchiveItem>> {
        Ok(self
            .fetcher
            .next()
            .await?
            .map(|item| self.provenance.archive(item, self.filter_classified)))
    }
}
