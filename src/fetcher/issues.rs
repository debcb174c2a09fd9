//
//  bitbucket-collector
//  fetcher/issues.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Issue merging: comments, then reporter and assignee.

use super::{attach_users, fetch_comments, MergedItem};
use crate::api::cloud::{Category, ParentRecord};
use crate::api::BitbucketClient;
use crate::error::Result;

pub(super) async fn merge(
    client: &mut BitbucketClient,
    record: ParentRecord,
    exclude_user_data: bool,
) -> Result<MergedItem> {
    let comments = fetch_comments(client, Category::Issue, record.id, exclude_user_data).await?;
    let mut item = MergedItem::new(Category::Issue, record, comments);

    if !exclude_user_data {
        attach_users(client, &mut item).await?;
    }

    Ok(item)
}
