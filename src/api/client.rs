//
//  bitbucket-collector
//  api/client.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # HTTP Client for the Bitbucket Cloud API
//!
//! [`BitbucketClient`] performs the authenticated, paginated `GET`s the
//! collector needs against one repository.
//!
//! ## Features
//!
//! - Bearer token injection from the run's [`TokenManager`]
//! - One token refresh and a single retry when a token is rejected (401)
//! - Exponential backoff on 429, 5xx and dropped connections
//! - Rate-limit budget tracking before every request
//! - Strict decoding of page envelopes
//! - In-run cache of user profiles
//!
//! ## Pagination
//!
//! Listing methods return a [`PageCursor`] without touching the network.
//! Each call to [`next_page`](BitbucketClient::next_page) fetches exactly
//! one page, so callers control how far a walk goes and can interleave
//! walks (a parent listing and each parent's comments) on one client.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::cloud::{pullrequests, Category, CommentRecord, ParentRecord};
use super::common::{format_api_error, ClientError, PageCursor, PaginatedResponse};
use super::ratelimit::{RateLimitHandler, RetryPolicy};
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::auth::{AuthCredential, TokenManager};
use crate::error::Result;

/// Base URL of the Bitbucket Cloud REST API.
pub const DEFAULT_API_URL: &str = "https://api.bitbucket.org/2.0";

/// Default page size, sent as `pagelen`.
pub const DEFAULT_MAX_ITEMS: u32 = 50;

/// Authenticated client bound to one repository.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use bitbucket_collector::api::{BitbucketClient, HttpTransport};
/// use bitbucket_collector::api::cloud::Category;
/// use bitbucket_collector::auth::{Credentials, TokenManager};
///
/// let transport = Arc::new(HttpTransport::new(true)?);
/// let tokens = TokenManager::new(Credentials::new("key", "secret", "refresh"), transport.clone());
/// let mut client = BitbucketClient::new("atlassian", "python-bitbucket", tokens, transport);
///
/// let mut cursor = client.fetch_collection(Category::Issue, None);
/// while let Some(page) = client.next_page(&mut cursor).await? {
///     for issue in page.values {
///         println!("#{} updated {}", issue.id, issue.updated_on);
///     }
/// }
/// ```
pub struct BitbucketClient {
    transport: Arc<dyn Transport>,
    tokens: TokenManager,
    base_url: String,
    owner: String,
    repository: String,
    max_items: u32,
    retry: RetryPolicy,
    rate_limit: RateLimitHandler,
    users: HashMap<String, Value>,
}

impl BitbucketClient {
    /// Creates a client for `owner/repository` against Bitbucket Cloud.
    pub fn new(
        owner: impl Into<String>,
        repository: impl Into<String>,
        tokens: TokenManager,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            transport,
            tokens,
            base_url: DEFAULT_API_URL.to_string(),
            owner: owner.into(),
            repository: repository.into(),
            max_items: DEFAULT_MAX_ITEMS,
            retry: RetryPolicy::default(),
            rate_limit: RateLimitHandler::default(),
            users: HashMap::new(),
        }
    }

    /// Overrides the API base URL. A trailing `/` is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the page size.
    pub fn with_max_items(mut self, max_items: u32) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets the backoff policy for transient failures.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the rate-limit handler.
    pub fn with_rate_limit(mut self, rate_limit: RateLimitHandler) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The token manager owned by this client.
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// The rate-limit handler owned by this client.
    pub fn rate_limit(&self) -> &RateLimitHandler {
        &self.rate_limit
    }

    fn repository_url(&self, path: &str) -> String {
        format!(
            "{}/repositories/{}/{}/{}",
            self.base_url, self.owner, self.repository, path
        )
    }

    fn page_query(&self) -> Vec<(String, String)> {
        vec![("pagelen".to_string(), self.max_items.to_string())]
    }

    /// Cursor over the issues or pull requests of the repository, oldest
    /// update first.
    ///
    /// # Parameters
    ///
    /// - `category` - Which collection to list
    /// - `since` - Only list records updated at or after this instant
    pub fn fetch_collection(
        &self,
        category: Category,
        since: Option<DateTime<Utc>>,
    ) -> PageCursor<ParentRecord> {
        let mut query = vec![("sort".to_string(), "updated_on".to_string())];
        query.extend(self.page_query());

        if let Some(since) = since {
            query.push((
                "q".to_string(),
                format!("updated_on >= {}", since.to_rfc3339()),
            ));
        }

        if category == Category::PullRequest {
            for state in pullrequests::STATES {
                query.push(("state".to_string(), state.to_string()));
            }
        }

        PageCursor::new(self.repository_url(category.resource()), query)
    }

    /// Cursor over the comments of one issue or pull request, in API order.
    pub fn fetch_comments(&self, category: Category, parent_id: u64) -> PageCursor<CommentRecord> {
        let path = format!("{}/{}/comments", category.resource(), parent_id);
        PageCursor::new(self.repository_url(&path), self.page_query())
    }

    /// Cursor over the activity log of a pull request.
    pub fn fetch_activity(&self, pr_id: u64) -> PageCursor<Value> {
        let path = format!("{}/{}/activity", pullrequests::RESOURCE, pr_id);
        PageCursor::new(self.repository_url(&path), self.page_query())
    }

    /// Cursor over the commits of a pull request.
    pub fn fetch_commits(&self, pr_id: u64) -> PageCursor<Value> {
        let path = format!("{}/{}/commits", pullrequests::RESOURCE, pr_id);
        PageCursor::new(self.repository_url(&path), self.page_query())
    }

    /// Fetches the next page of `cursor`, or `None` once it is exhausted.
    ///
    /// # Errors
    ///
    /// - [`Error::Authentication`](crate::Error::Authentication) if a token
    ///   refresh fails
    /// - [`Error::Client`](crate::Error::Client) if the request fails after
    ///   retries or the page does not match the envelope schema
    pub async fn next_page<T: DeserializeOwned>(
        &mut self,
        cursor: &mut PageCursor<T>,
    ) -> Result<Option<PaginatedResponse<T>>> {
        let Some((url, query)) = cursor.take_request() else {
            return Ok(None);
        };

        let response = self.get(&url, &query).await?;
        let page: PaginatedResponse<T> =
            serde_json::from_str(&response.body).map_err(|e| ClientError::schema(&url, e))?;

        cursor.advance(&url, page.next.clone())?;

        debug!(
            url = %url,
            page = cursor.pages_fetched(),
            records = page.values.len(),
            more = page.has_next(),
            "Fetched page"
        );
        Ok(Some(page))
    }

    /// Walks `cursor` to the end and returns every record in order.
    pub async fn drain<T: DeserializeOwned>(&mut self, mut cursor: PageCursor<T>) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page(&mut cursor).await? {
            items.extend(page.values);
        }
        Ok(items)
    }

    /// Fetches a user profile by its `links.self.href`, once per run.
    pub async fn user(&mut self, href: &str) -> Result<Value> {
        if let Some(user) = self.users.get(href) {
            return Ok(user.clone());
        }

        let response = self.get(href, &[]).await?;
        let user: Value =
            serde_json::from_str(&response.body).map_err(|e| ClientError::schema(href, e))?;

        debug!(href = %href, "Fetched user");
        self.users.insert(href.to_string(), user.clone());
        Ok(user)
    }

    /// Authenticated `GET` with token refresh, backoff and rate limiting.
    async fn get(&mut self, url: &str, query: &[(String, String)]) -> Result<HttpResponse> {
        let mut refreshed = false;
        let mut attempt = 0;

        loop {
            self.rate_limit.sleep_for_rate_limit().await?;

            let token = self.tokens.get_access_token().await?;
            let request = HttpRequest::get(url)
                .query(query.to_vec())
                .auth(AuthCredential::bearer(token));

            debug!(url = %url, attempt, "GET");
            let response = match self.transport.send(&request).await {
                Ok(response) => response,
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt, None);
                    warn!(
                        url = %url,
                        retry = attempt + 1,
                        seconds = delay.as_secs_f64(),
                        "Request failed, backing off: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            self.rate_limit.update(&response);

            if response.is_success() {
                return Ok(response);
            }

            let status = response.status;

            if status == 401 && !refreshed {
                warn!(url = %url, "Access token rejected, refreshing");
                self.tokens.refresh().await?;
                refreshed = true;
                continue;
            }

            if RetryPolicy::is_retryable(status) && attempt < self.retry.max_retries {
                let delay = self
                    .retry
                    .delay_for(attempt, RetryPolicy::retry_after(&response));
                warn!(
                    url = %url,
                    status,
                    retry = attempt + 1,
                    seconds = delay.as_secs_f64(),
                    "Transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(ClientError::Http {
                status,
                url: url.to_string(),
                message: format_api_error(status, &response.body),
            }
            .into());
        }
    }
}
