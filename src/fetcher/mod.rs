//
//  bitbucket-collector
//  fetcher/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Item Fetchers
//!
//! An [`ItemFetcher`] turns the paginated parent listing of one category into
//! a lazy stream of [`MergedItem`]s: each parent is yielded together with all
//! of its comments (and, for pull requests, activity and commits).
//!
//! ## Flow
//!
//! ```text
//! parent page 1 ──► parent A ──► comments(A) ──► yield A
//!                   parent B ──► comments(B) ──► yield B
//! parent page 2 ──► ...
//! ```
//!
//! Pages are fetched one at a time and only when the previous one has been
//! consumed. The first error ends the stream: the parent being merged is
//! dropped, everything yielded before stays valid.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::api::cloud::{Category, CommentRecord, ParentRecord};
use crate::api::common::PageCursor;
use crate::api::BitbucketClient;
use crate::error::Result;

mod issues;
mod pullrequests;

/// A parent record with its nested data attached.
///
/// Serializes as the parent's own JSON object extended with its comments
/// (`comments_data` for issues, `review_comments_data` for pull requests),
/// the pull request extras, and a `<field>_data` member for every
/// user-valued field once users have been resolved (`{}` when unset).
#[derive(Debug, Clone, PartialEq)]
pub struct MergedItem {
    /// Category the record was fetched under.
    pub category: Category,

    pub record: ParentRecord,

    /// Comments in API order.
    pub comments_data: Vec<CommentRecord>,

    /// Pull request activity reduced to `update`/`approval` entries.
    pub activity_data: Option<Vec<Value>>,

    /// Pull request commit hashes.
    pub commits_data: Option<Vec<String>>,

    /// Resolved users keyed `<field>_data`.
    pub users_data: BTreeMap<String, Value>,
}

impl MergedItem {
    /// Wraps a parent of `category` and its comments.
    pub fn new(category: Category, record: ParentRecord, comments_data: Vec<CommentRecord>) -> Self {
        Self {
            category,
            record,
            comments_data,
            activity_data: None,
            commits_data: None,
            users_data: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.record.id
    }

    pub fn updated_on(&self) -> DateTime<Utc> {
        self.record.updated_on
    }
}

#[derive(Serialize)]
struct MergedItemFields<'a> {
    #[serde(flatten)]
    record: &'a ParentRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    comments_data: Option<&'a [CommentRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    review_comments_data: Option<&'a [CommentRecord]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    activity_data: Option<&'a [Value]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commits_data: Option<&'a [String]>,
    #[serde(flatten)]
    users_data: &'a BTreeMap<String, Value>,
}

impl Serialize for MergedItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let comments = Some(self.comments_data.as_slice());
        let (comments_data, review_comments_data) = match self.category {
            Category::Issue => (comments, None),
            Category::PullRequest => (None, comments),
        };

        MergedItemFields {
            record: &self.record,
            comments_data,
            review_comments_data,
            activity_data: self.activity_data.as_deref(),
            commits_data: self.commits_data.as_deref(),
            users_data: &self.users_data,
        }
        .serialize(serializer)
    }
}

/// Lazy stream of merged items for one category.
///
/// # Example
///
/// ```rust,ignore
/// let mut fetcher = ItemFetcher::new(client, Category::Issue, None);
/// while let Some(item) = fetcher.next().await? {
///     println!("#{} with {} comments", item.id(), item.comments_data.len());
/// }
/// ```
pub struct ItemFetcher {
    client: BitbucketClient,
    category: Category,
    since: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
    exclude_user_data: bool,
    cursor: PageCursor<ParentRecord>,
    pending: VecDeque<ParentRecord>,
    finished: bool,
    yielded: u64,
}

impl ItemFetcher {
    /// Creates a fetcher for records updated at or after `since`.
    ///
    /// No request is made until the first call to [`next`](Self::next).
    pub fn new(client: BitbucketClient, category: Category, since: Option<DateTime<Utc>>) -> Self {
        let cursor = client.fetch_collection(category, since);
        Self {
            client,
            category,
            since,
            to_date: None,
            exclude_user_data: false,
            cursor,
            pending: VecDeque::new(),
            finished: false,
            yielded: 0,
        }
    }

    /// Stops the stream at the first record updated after `to_date`.
    pub fn until(mut self, to_date: DateTime<Utc>) -> Self {
        self.to_date = Some(to_date);
        self
    }

    /// Skips user profile lookups.
    pub fn exclude_user_data(mut self, exclude: bool) -> Self {
        self.exclude_user_data = exclude;
        self
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Number of items yielded so far.
    pub fn yielded(&self) -> u64 {
        self.yielded
    }

    /// Yields the next merged item, or `None` once the stream is exhausted.
    ///
    /// After an error the stream is exhausted: further calls return
    /// `Ok(None)` without touching the network.
    pub async fn next(&mut self) -> Result<Option<MergedItem>> {
        if self.finished {
            return Ok(None);
        }

        match self.advance().await {
            Ok(Some(item)) => {
                self.yielded += 1;
                Ok(Some(item))
            }
            Ok(None) => {
                self.finished = true;
                info!(
                    category = %self.category,
                    items = self.yielded,
                    "Fetch completed"
                );
                Ok(None)
            }
            Err(err) => {
                self.finished = true;
                Err(err)
            }
        }
    }

    async fn advance(&mut self) -> Result<Option<MergedItem>> {
        loop {
            let record = match self.pending.pop_front() {
                Some(record) => record,
                None => match self.client.next_page(&mut self.cursor).await? {
                    Some(page) => {
                        self.pending.extend(page.values);
                        continue;
                    }
                    None => return Ok(None),
                },
            };

            if let Some(to_date) = self.to_date {
                if record.updated_on > to_date {
                    debug!(id = record.id, updated_on = %record.updated_on, "Reached to_date");
                    self.pending.clear();
                    return Ok(None);
                }
            }

            if let Some(since) = self.since {
                if record.updated_on < since {
                    debug!(id = record.id, updated_on = %record.updated_on, "Skipping record older than since");
                    continue;
                }
            }

            let item = match self.category {
                Category::Issue => {
                    issues::merge(&mut self.client, record, self.exclude_user_data).await?
                }
                Category::PullRequest => {
                    pullrequests::merge(&mut self.client, record, self.exclude_user_data).await?
                }
            };
            return Ok(Some(item));
        }
    }
}

/// Drains the comments of a parent, stamping `parent_id` and resolving
/// comment authors unless user data is excluded.
pub(crate) async fn fetch_comments(
    client: &mut BitbucketClient,
    category: Category,
    parent_id: u64,
    exclude_user_data: bool,
) -> Result<Vec<CommentRecord>> {
    let cursor = client.fetch_comments(category, parent_id);
    let mut comments = client.drain(cursor).await?;

    for comment in &mut comments {
        comment.parent_id = parent_id;

        if !exclude_user_data {
            if let Some(href) = comment.user_href().map(str::to_string) {
                let user = client.user(&href).await?;
                comment.fields.insert("user_data".to_string(), user);
            }
        }
    }

    debug!(parent_id, comments = comments.len(), "Fetched comments");
    Ok(comments)
}

/// Resolves the user-valued fields of the item's category into
/// `<field>_data` members. Unset users (deleted accounts, unassigned
/// issues) resolve to an empty object.
pub(crate) async fn attach_users(client: &mut BitbucketClient, item: &mut MergedItem) -> Result<()> {
    for field in item.category.user_fields() {
        let user = match item.record.user_href(field).map(str::to_string) {
            Some(href) => client.user(&href).await?,
            None => Value::Object(Map::new()),
        };
        item.users_data.insert(format!("{}_data", field), user);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::fixtures::*;
    use super::*;
    use crate::api::transport::testing::ScriptedTransport;
    use crate::api::transport::Method;
    use crate::error::Error;
    use crate::util::parse_datetime;

    fn issues_url() -> String {
        format!("{}/issues", REPO)
    }

    fn comments_url(id: u64) -> String {
        format!("{}/issues/{}/comments", REPO, id)
    }

    async fn collect(fetcher: &mut ItemFetcher) -> (Vec<MergedItem>, Option<Error>) {
        let mut items = Vec::new();
        loop {
            match fetcher.next().await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => return (items, None),
                Err(err) => return (items, Some(err)),
            }
        }
    }

    #[tokio::test]
    async fn test_two_pages_two_parents_one_comment_each() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        let page2 = format!("{}?page=2", issues_url());
        transport.on_get(
            &issues_url(),
            200,
            &page(&[issue_json(1, 1, None), issue_json(2, 2, None)], Some(&page2)),
        );
        transport.on_get(
            &page2,
            200,
            &page(&[issue_json(3, 3, None), issue_json(4, 4, None)], None),
        );
        for id in 1..=4 {
            transport.on_get(&comments_url(id), 200, &page(&[comment_json(id * 10, None)], None));
        }

        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, None);
        let (items, err) = collect(&mut fetcher).await;

        assert!(err.is_none());
        assert_eq!(items.iter().map(MergedItem::id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        for item in &items {
            assert_eq!(item.comments_data.len(), 1);
            assert_eq!(item.comments_data[0].id, item.id() * 10);
            assert_eq!(item.comments_data[0].parent_id, item.id());
        }
        assert!(items.windows(2).all(|w| w[0].updated_on() <= w[1].updated_on()));

        // 2 parent pages + 4 comment pages, nothing more.
        let gets = transport
            .requests()
            .iter()
            .filter(|r| r.method == Method::Get)
            .count();
        assert_eq!(gets, 6);
        assert_eq!(fetcher.yielded(), 4);
    }

    #[tokio::test]
    async fn test_comments_are_fetched_before_next_parent_page() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        let page2 = format!("{}?page=2", issues_url());
        transport.on_get(&issues_url(), 200, &page(&[issue_json(1, 1, None)], Some(&page2)));
        transport.on_get(&page2, 200, &page(&[issue_json(2, 2, None)], None));
        transport.on_get(&comments_url(1), 200, &page(&[], None));
        transport.on_get(&comments_url(2), 200, &page(&[], None));

        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, None);
        let first = fetcher.next().await.unwrap().unwrap();
        assert_eq!(first.id(), 1);
        // Page 2 is not requested until the first page is consumed.
        assert_eq!(transport.count(Method::Get, &page2), 0);

        let urls: Vec<String> = transport
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Get)
            .map(|r| r.url)
            .collect();
        assert_eq!(urls, vec![issues_url(), comments_url(1)]);
    }

    #[tokio::test]
    async fn test_parent_without_comments_is_still_yielded() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        transport.on_get(&issues_url(), 200, &page(&[issue_json(5, 5, None)], None));
        transport.on_get(&comments_url(5), 200, &page(&[], None));

        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, None);
        let (items, err) = collect(&mut fetcher).await;

        assert!(err.is_none());
        assert_eq!(items.len(), 1);
        assert!(items[0].comments_data.is_empty());

        let json = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(json["comments_data"], serde_json::json!([]));
        assert_eq!(json["title"], "Issue 5");
        assert_eq!(json["updated_on"], "2024-01-05T12:00:00.000000+00:00");
        assert!(json.get("review_comments_data").is_none());
        assert!(json.get("activity_data").is_none());
        assert_eq!(json["reporter_data"], serde_json::json!({}));
        assert_eq!(json["assignee_data"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_comment_failure_on_third_parent_stops_stream() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        transport.on_get(
            &issues_url(),
            200,
            &page(
                &[
                    issue_json(1, 1, None),
                    issue_json(2, 2, None),
                    issue_json(3, 3, None),
                    issue_json(4, 4, None),
                ],
                None,
            ),
        );
        transport.on_get(&comments_url(1), 200, &page(&[comment_json(1, None)], None));
        transport.on_get(&comments_url(2), 200, &page(&[comment_json(2, None)], None));
        transport.on_get(&comments_url(3), 500, "Internal Server Error");
        transport.on_get(&comments_url(4), 200, &page(&[comment_json(4, None)], None));

        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, None);
        let (items, err) = collect(&mut fetcher).await;

        assert_eq!(items.len(), 2);
        let err = err.expect("expected a client error");
        assert!(matches!(err, Error::Client(_)));
        assert_eq!(err.status(), Some(500));

        assert!(fetcher.next().await.unwrap().is_none());
        assert_eq!(transport.count(Method::Get, &comments_url(4)), 0);
    }

    #[tokio::test]
    async fn test_since_and_to_date_bounds() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        transport.on_get(
            &issues_url(),
            200,
            &page(
                &[
                    issue_json(1, 1, None),
                    issue_json(2, 10, None),
                    issue_json(3, 20, None),
                    issue_json(4, 25, None),
                ],
                None,
            ),
        );
        for id in 1..=4 {
            transport.on_get(&comments_url(id), 200, &page(&[], None));
        }

        let since = parse_datetime("2024-01-05").unwrap();
        let to_date = parse_datetime("2024-01-21").unwrap();
        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, Some(since))
            .until(to_date);
        let (items, err) = collect(&mut fetcher).await;

        assert!(err.is_none());
        assert_eq!(items.iter().map(MergedItem::id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(items.iter().all(|i| i.updated_on() >= since));
        assert_eq!(transport.count(Method::Get, &comments_url(1)), 0);
        assert_eq!(transport.count(Method::Get, &comments_url(4)), 0);

        let request = &transport.requests()[1];
        assert_eq!(
            request.query_param("q"),
            Some("updated_on >= 2024-01-05T00:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn test_issue_users_are_resolved_and_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        transport.on_get(
            &issues_url(),
            200,
            &page(&[issue_json(1, 1, Some("ada")), issue_json(2, 2, Some("ada"))], None),
        );
        transport.on_get(&comments_url(1), 200, &page(&[comment_json(7, Some("bob"))], None));
        transport.on_get(&comments_url(2), 200, &page(&[comment_json(8, None)], None));
        let ada = format!("{}/users/ada", API);
        let bob = format!("{}/users/bob", API);
        transport.on_get(&ada, 200, r#"{"display_name": "Ada Lovelace"}"#);
        transport.on_get(&bob, 200, r#"{"display_name": "Bob"}"#);

        let mut fetcher = ItemFetcher::new(client(&transport), Category::Issue, None);
        let (items, err) = collect(&mut fetcher).await;
        assert!(err.is_none());

        let first = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(first["reporter_data"]["display_name"], "Ada Lovelace");
        assert_eq!(first["assignee_data"], serde_json::json!({}));
        assert_eq!(first["comments_data"][0]["user_data"]["display_name"], "Bob");

        let second = serde_json::to_value(&items[1]).unwrap();
        assert!(second["comments_data"][0].get("user_data").is_none());

        assert_eq!(transport.count(Method::Get, &ada), 1);
        assert_eq!(transport.count(Method::Get, &bob), 1);
    }

    #[tokio::test]
    async fn test_exclude_user_data_skips_lookups() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_token(TOKEN, "tok");
        transport.on_get(&issues_url(), 200, &page(&[issue_json(1, 1, Some("ada"))], None));
        transport.on_get(&comments_url(1), 200, &page(&[comment_json(7, Some("bob"))], None));

        let mut fetcher =
            ItemFetcher::new(client(&transport), Category::Issue, None).exclude_user_data(true);
        let (items, err) = collect(&mut fetcher).await;

        assert!(err.is_none());
        assert!(items[0].users_data.is_empty());
        assert!(!items[0].comments_data[0].fields.contains_key("user_data"));
        assert!(!transport
            .requests()
            .iter()
            .any(|r| r.url.contains("/users/")));
    }
}
