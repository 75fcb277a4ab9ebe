//! Knowledge-base entries and weak points.

use serde::{Deserialize, Serialize};

use super::{new_id, now_millis};

/// A note the student keeps in the global knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbBlock {
    pub id: String,
    pub content: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl KbBlock {
    pub fn new(content: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: new_id(),
            content: content.into(),
            timestamp: now_millis(),
            tags: if tags.is_empty() { None } else { Some(tags) },
        }
    }
}

/// Whether the student confirmed a suggested weak point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WpStatus {
    Suggested,
    Accepted,
}

/// A knowledge gap, usually suggested by the tutor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WpBlock {
    pub id: String,
    pub content: String,
    pub timestamp: i64,
    pub status: WpStatus,
}

impl WpBlock {
    pub fn suggested(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            content: content.into(),
            timestamp: now_millis(),
            status: WpStatus::Suggested,
        }
    }

    /// Key used to detect repeated suggestions.
    pub fn dedup_key(content: &str) -> String {
        content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
    }
}
