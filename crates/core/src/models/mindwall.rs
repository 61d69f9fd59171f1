//! Mind wall issue model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Comment;

/// A grievance on the mind wall. Support-only, no downvotes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindWallIssue {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub author_id: String,
    pub author_display_name: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub support_count: u64,
    #[serde(default)]
    pub supported_by: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl MindWallIssue {
    pub fn is_supported_by(&self, uid: &str) -> bool {
        self.supported_by.iter().any(|s| s == uid)
    }
}

/// Fields a user supplies when raising an issue
#[derive(Debug, Clone, Default)]
pub struct NewMindWallIssue {
    pub title: String,
    pub description: String,
    pub category: String,
    pub is_anonymous: bool,
}

impl NewMindWallIssue {
    pub fn new(title: impl Into<String>, description: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            is_anonymous: false,
        }
    }

    pub fn anonymous(mut self) -> Self {
        self.is_anonymous = true;
        self
    }
}
