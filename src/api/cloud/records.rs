//
//  bitbucket-collector
//  api/cloud/records.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Parent and comment records.
//!
//! Both types deserialize strictly on the fields the pipeline needs
//! (`id`, `updated_on`) and keep the members of the JSON object in a
//! flattened map. A [`ParentRecord`] keeps all of them, typed ones
//! included, so serializing it gives back what the API sent; a
//! [`CommentRecord`] gains the `parent_id` stamped by the fetcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An issue or pull request as listed by the API.
///
/// # Example
///
/// ```rust
/// use bitbucket_collector::api::cloud::ParentRecord;
///
/// let json = r#"{
///     "id": 7,
///     "updated_on": "2024-03-01T10:00:00.000000+00:00",
///     "type": "issue",
///     "title": "Crash on start",
///     "reporter": {"links": {"self": {"href": "https://api.bitbucket.org/2.0/users/u1"}}}
/// }"#;
///
/// let record: ParentRecord = serde_json::from_str(json).unwrap();
/// assert_eq!(record.id, 7);
/// assert_eq!(record.record_type(), Some("issue"));
/// assert_eq!(record.user_href("reporter"), Some("https://api.bitbucket.org/2.0/users/u1"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct ParentRecord {
    /// Repository-scoped numeric identifier.
    #[serde(skip_serializing)]
    pub id: u64,

    /// Last modification time; the listing is sorted on it.
    #[serde(skip_serializing)]
    pub updated_on: DateTime<Utc>,

    /// Every field as sent, `id` and `updated_on` included.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for ParentRecord {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = fields
            .get("id")
            .and_then(Value::as_u64)
            .ok_or("missing or invalid field `id`")?;
        let raw = fields
            .get("updated_on")
            .and_then(Value::as_str)
            .ok_or("missing or invalid field `updated_on`")?;
        let updated_on = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid `updated_on` '{}': {}", raw, e))?
            .with_timezone(&Utc);

        Ok(Self {
            id,
            updated_on,
            fields,
        })
    }
}

impl ParentRecord {
    /// The record's `type` member (`issue`, `pullrequest`).
    pub fn record_type(&self) -> Option<&str> {
        self.fields.get("type").and_then(Value::as_str)
    }

    /// Raw value of an arbitrary field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The `links.self.href` of a user-valued field, if set.
    pub fn user_href(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(self_href)
    }
}

/// A comment on an issue or a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: u64,

    /// Id of the owning parent, filled in by the fetcher.
    #[serde(default)]
    pub parent_id: u64,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CommentRecord {
    /// The `links.self.href` of the comment author, if set.
    pub fn user_href(&self) -> Option<&str> {
        self.fields.get("user").and_then(self_href)
    }
}

/// Extracts `links.self.href` from a user object. `null` users (deleted
/// accounts, unassigned issues) have none.
pub fn self_href(user: &Value) -> Option<&str> {
    user.get("links")?.get("self")?.get("href")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parent_preserves_unknown_fields() {
        let raw = json!({
            "id": 3,
            "updated_on": "2024-01-02T03:04:05+00:00",
            "title": "t",
            "votes": 2,
            "assignee": null
        });
        let record: ParentRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.field("votes"), Some(&json!(2)));
        assert_eq!(record.user_href("assignee"), None);
        assert_eq!(record.record_type(), None);

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["title"], "t");
        assert_eq!(back["id"], 3);
    }

    #[test]
    fn test_parent_requires_updated_on() {
        let raw = json!({"id": 3, "title": "t"});
        assert!(serde_json::from_value::<ParentRecord>(raw).is_err());

        let raw = json!({"id": 3, "updated_on": "yesterday"});
        assert!(serde_json::from_value::<ParentRecord>(raw).is_err());
    }

    #[test]
    fn test_parent_serializes_timestamps_as_sent() {
        let raw = json!({
            "id": 8,
            "updated_on": "2024-01-01T12:00:00.000000+00:00",
            "created_on": "2023-12-31T08:00:00.123456+00:00",
            "type": "issue"
        });
        let record: ParentRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.updated_on.timestamp(), 1_704_110_400);

        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
    }

    #[test]
    fn test_comment_defaults_parent_id() {
        let raw = json!({
            "id": 11,
            "content": {"raw": "hello"},
            "user": {"links": {"self": {"href": "https://api/users/a"}}}
        });
        let comment: CommentRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(comment.parent_id, 0);
        assert_eq!(comment.user_href(), Some("https://api/users/a"));
        assert!(!comment.fields.contains_key("parent_id"));
    }
}
