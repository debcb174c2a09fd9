//
//  bitbucket-collector
//  api/cloud/issues.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Cloud issue tracker specifics.
//!
//! # Notes
//!
//! - Issues must be enabled for the repository, otherwise the listing
//!   answers 404
//! - Issue numbers are sequential within each repository

/// Repository sub-resource holding issues.
pub const RESOURCE: &str = "issues";

/// Issue fields that reference users.
pub const USER_FIELDS: [&str; 2] = ["reporter", "assignee"];

/// Member of a merged issue holding its comments.
pub const COMMENTS_FIELD: &str = "comments_data";
