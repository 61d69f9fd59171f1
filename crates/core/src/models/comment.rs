//! Comment model shared by posts and wall issues

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A comment appended to an engagement item.
///
/// The store has no per-element id generator, so ids are minted client-side
/// from the creation time plus a short random suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    /// Always recorded, even for anonymous comments
    pub author_id: String,
    pub author_display_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl Comment {
    pub fn new(author_id: String, author_display_name: String, text: String) -> Self {
        let created_at = Utc::now();
        Self {
            id: comment_id(created_at),
            author_id,
            author_display_name,
            text,
            created_at,
            is_anonymous: false,
        }
    }

    /// Build a comment whose displayed name is replaced by `label`
    pub fn anonymous(author_id: String, label: &str, text: String) -> Self {
        let mut comment = Self::new(author_id, label.to_string(), text);
        comment.is_anonymous = true;
        comment
    }
}

fn comment_id(at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", at.timestamp_millis(), suffix)
}
