//
//  bitbucket-collector
//  api/cloud/pullrequests.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Cloud pull request specifics.
//!
//! # Pull Request States
//!
//! * `OPEN` - Active and accepting reviews
//! * `MERGED` - Changes have been merged into the destination branch
//! * `DECLINED` - Rejected without merging
//! * `SUPERSEDED` - Replaced by another pull request
//!
//! The listing endpoint returns only `OPEN` pull requests unless states are
//! requested explicitly, so the collector always asks for all four.

use serde_json::{Map, Value};

/// Repository sub-resource holding pull requests.
pub const RESOURCE: &str = "pullrequests";

/// Every pull request state, sent as repeated `state` parameters.
pub const STATES: [&str; 4] = ["MERGED", "OPEN", "DECLINED", "SUPERSEDED"];

/// Pull request fields that reference users.
pub const USER_FIELDS: [&str; 2] = ["author", "closed_by"];

/// Member of a merged pull request holding its review comments.
pub const COMMENTS_FIELD: &str = "review_comments_data";

/// Members of an activity entry kept in `activity_data`.
pub const ACTIVITY_FIELDS: [&str; 2] = ["update", "approval"];

/// Reduces an activity entry to its `update` and `approval` members.
///
/// Activity entries also embed full comment objects, which are collected
/// separately, so those are dropped here. Entries with neither member
/// reduce to an empty object.
pub fn reduce_activity(entry: &Value) -> Value {
    let reduced: Map<String, Value> = ACTIVITY_FIELDS
        .iter()
        .filter_map(|field| entry.get(*field).map(|v| (field.to_string(), v.clone())))
        .collect();
    Value::Object(reduced)
}

/// The `hash` of a commit entry.
pub fn commit_hash(commit: &Value) -> Option<&str> {
    commit.get("hash").and_then(Value::as_str)
}
