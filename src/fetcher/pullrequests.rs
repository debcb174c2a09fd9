//
//  bitbucket-collector
//  fetcher/pullrequests.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Pull request merging.
//!
//! A pull request is enriched, in order, with its activity log, its
//! comments, its commit hashes and finally its author and closer. Activity
//! and comment failures abort the run; a commit listing failure only cuts
//! the commit list short, since Bitbucket answers 404 for commits whose
//! source branch has been deleted.

use serde_json::Value;
use tracing::warn;

use super::{attach_users, fetch_comments, MergedItem};
use crate::api::cloud::{pullrequests, Category, ParentRecord};
use crate::api::common::ClientError;
use crate::api::BitbucketClient;
use crate::error::{Error, Result};

pub(super) async fn merge(
    client: &mut BitbucketClient,
    record: ParentRecord,
    exclude_user_data: bool,
) -> Result<MergedItem> {
    let id = record.id;

    let cursor = client.fetch_activity(id);
    let activity: Vec<Value> = client
        .drain(cursor)
        .await?
        .iter()
        .map(pullrequests::reduce_activity)
        .collect();
    let comments = fetch_comments(client, Category::PullRequest, id, exclude_user_data).await?;
    let commits = commit_hashes(client, id).await?;

    let mut item = MergedItem::new(Category::PullRequest, record, comments);
    item.activity_data = Some(activity);
    item.commits_data = Some(commits);

    if !exclude_user_data {
        attach_users(client, &mut item).await?;
    }

    Ok(item)
}

/// Collects commit hashes page by page. An HTTP failure keeps the hashes
/// gathered so far.
async fn commit_hashes(client: &mut BitbucketClient, pr_id: u64) -> Result<Vec<String>> {
    let mut hashes = Vec::new();
    let mut cursor = client.fetch_commits(pr_id);

    loop {
        match client.next_page(&mut cursor).await {
            Ok(Some(page)) => hashes.extend(
                page.values
                    .iter()
                    .filter_map(pullrequests::commit_hash)
                    .map(str::to_string),
            ),
            Ok(None) => break,
            Err(Error::Client(ClientError::Http { status, message, .. })) => {
                warn!(
                    pr = pr_id,
                    status,
                    kept = hashes.len(),
                    "Cannot list pull request commits: {}",
                    message
                );
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(hashes)
}
