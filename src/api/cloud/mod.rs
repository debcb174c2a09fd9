//
//  bitbucket-collector
//  api/cloud/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Bitbucket Cloud API v2.0 record schemas.
//!
//! The collector keeps every field Bitbucket returns, so records are thin
//! typed shells around the raw JSON: the handful of fields the pipeline
//! depends on are typed, everything else is preserved verbatim.
//!
//! # Module Organization
//!
//! - [`records`] - [`ParentRecord`] and [`CommentRecord`]
//! - [`issues`] - Issue tracker specifics (user fields)
//! - [`pullrequests`] - Pull request specifics (states, activity, commits)
//!
//! # Notes
//!
//! - All timestamps are in ISO 8601 format
//! - Listings are requested sorted by `updated_on`, oldest first

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod issues;
pub mod pullrequests;
pub mod records;

pub use records::*;

/// The two resource categories the collector mines.
///
/// # Example
///
/// ```rust
/// use bitbucket_collector::api::cloud::Category;
///
/// let category: Category = "pull_request".parse().unwrap();
/// assert_eq!(category.resource(), "pullrequests");
/// assert!("wiki".parse::<Category>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Issue,
    PullRequest,
}

impl Category {
    /// Every supported category.
    pub const ALL: [Category; 2] = [Category::Issue, Category::PullRequest];

    /// The archive name of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::PullRequest => "pull_request",
        }
    }

    /// The repository sub-resource listing records of this category.
    pub fn resource(&self) -> &'static str {
        match self {
            Self::Issue => issues::RESOURCE,
            Self::PullRequest => pullrequests::RESOURCE,
        }
    }

    /// Fields of a parent record that reference users.
    pub fn user_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Issue => &issues::USER_FIELDS,
            Self::PullRequest => &pullrequests::USER_FIELDS,
        }
    }

    /// Member of a merged record that holds its comments.
    pub fn comments_field(&self) -> &'static str {
        match self {
            Self::Issue => issues::COMMENTS_FIELD,
            Self::PullRequest => pullrequests::COMMENTS_FIELD,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue" => Ok(Self::Issue),
            "pull_request" => Ok(Self::PullRequest),
            other => Err(Error::validation(format!(
                "unknown category '{}', expected one of: issue, pull_request",
                other
            ))),
        }
    }
}
