//
//  bitbucket-collector
//  api/common/pagination.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Pagination Types for Bitbucket Cloud API Responses
//!
//! Bitbucket Cloud uses cursor-based pagination: every listing response
//! carries a `values` array and, when more data exists, a `next` URL that
//! already embeds every query parameter of the original request.
//!
//! # Overview
//!
//! | Type | Role |
//! |------|------|
//! | [`PaginatedResponse`] | One decoded page (the envelope) |
//! | [`PageCursor`] | Where a walk stands: first request, next URL, or done |
//!
//! A cursor never fetches anything by itself. It is handed to
//! [`BitbucketClient::next_page`](crate::api::BitbucketClient::next_page),
//! which performs exactly one HTTP call per pull. That keeps the walk lazy
//! and lets a caller interleave several walks (parents and their comments)
//! over a single client.
//!
//! # Notes
//!
//! - Cursors are not seekable; a walk can only be restarted from scratch,
//!   narrowed by an `updated_on` filter on the first request
//! - A `next` link pointing back at a URL already fetched by the same
//!   cursor is rejected instead of looping forever

use std::collections::HashSet;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use super::ClientError;

/// Paginated response from Bitbucket Cloud API.
///
/// `PaginatedResponse` represents a single page of results from the Bitbucket
/// Cloud REST API (v2.0).
///
/// # Type Parameters
///
/// - `T` - The type of items contained in the `values` array
///
/// # Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `values` | `Vec<T>` | Array of items in the current page |
/// | `page` | `Option<u32>` | Current page number (1-indexed) |
/// | `pagelen` | `Option<u32>` | Number of items per page |
/// | `size` | `Option<u32>` | Total number of items across all pages |
/// | `next` | `Option<String>` | URL to fetch the next page |
/// | `previous` | `Option<String>` | URL to fetch the previous page |
///
/// # Example
///
/// ```rust
/// use bitbucket_collector::api::common::PaginatedResponse;
///
/// let json = r#"{
///     "values": [1, 2, 3],
///     "page": 1,
///     "pagelen": 3,
///     "next": "https://api.bitbucket.org/2.0/repositories/o/r/issues?page=2"
/// }"#;
///
/// let response: PaginatedResponse<u32> = serde_json::from_str(json).unwrap();
/// assert_eq!(response.values.len(), 3);
/// assert!(response.has_next());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Array of items in the current page. May be empty.
    pub values: Vec<T>,

    /// Current page number (1-indexed).
    #[serde(default)]
    pub page: Option<u32>,

    /// Number of items per page.
    #[serde(default)]
    pub pagelen: Option<u32>,

    /// Total number of items across all pages, when the API computes it.
    #[serde(default)]
    pub size: Option<u32>,

    /// URL to fetch the next page of results.
    ///
    /// When `None`, there are no more pages to fetch.
    /// This is a complete URL that can be used directly.
    #[serde(default)]
    pub next: Option<String>,

    /// URL to fetch the previous page of results.
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> PaginatedResponse<T> {
    /// Checks if there are more pages of results available.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Returns the URL for the next page of results.
    pub fn next_url(&self) -> Option<&str> {
        self.next.as_deref()
    }
}

/// Position inside a paginated Bitbucket listing.
///
/// A fresh cursor holds the first request (URL plus query parameters).
/// After each page it holds the page's `next` URL, or nothing once the
/// listing is exhausted.
///
/// # Example
///
/// ```rust
/// use bitbucket_collector::api::common::PageCursor;
///
/// let cursor: PageCursor<u32> = PageCursor::new(
///     "https://api.bitbucket.org/2.0/repositories/o/r/issues",
///     vec![("sort".to_string(), "updated_on".to_string())],
/// );
/// assert!(cursor.has_more());
/// assert_eq!(cursor.pages_fetched(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct PageCursor<T> {
    first: Option<(String, Vec<(String, String)>)>,
    next: Option<String>,
    seen: HashSet<String>,
    pages: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PageCursor<T> {
    /// Creates a cursor positioned before the first page.
    pub fn new(url: impl Into<String>, query: Vec<(String, String)>) -> Self {
        Self {
            first: Some((url.into(), query)),
            next: None,
            seen: HashSet::new(),
            pages: 0,
            _marker: PhantomData,
        }
    }

    /// Whether another pull may return a page.
    pub fn has_more(&self) -> bool {
        self.first.is_some() || self.next.is_some()
    }

    /// URL the next pull will request, without its query parameters on the
    /// first page.
    pub fn next_url(&self) -> Option<&str> {
        match &self.first {
            Some((url, _)) => Some(url.as_str()),
            None => self.next.as_deref(),
        }
    }

    /// Number of pages pulled so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages
    }

    /// Takes the request for the next page, leaving the cursor exhausted
    /// until [`advance`](Self::advance) records where to go next.
    pub(crate) fn take_request(&mut self) -> Option<(String, Vec<(String, String)>)> {
        if let Some(first) = self.first.take() {
            return Some(first);
        }
        self.next.take().map(|url| (url, Vec::new()))
    }

    /// Records a fetched page: `fetched` is the URL just requested and
    /// `next` the page's continuation link.
    pub(crate) fn advance(&mut self, fetched: &str, next: Option<String>) -> Result<(), ClientError> {
        self.pages += 1;
        self.seen.insert(fetched.to_string());

        if let Some(next) = next {
            if self.seen.contains(&next) {
                return Err(ClientError::schema(
                    fetched,
                    format!("pagination cycle: next link points back to {}", next),
                ));
            }
            self.next = Some(next);
        }
        Ok(())
    }
}
