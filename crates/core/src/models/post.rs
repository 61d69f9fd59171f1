//! Feed post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Comment;

/// Post discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Activity,
    Concern,
    General,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Activity => "activity",
            PostKind::Concern => "concern",
            PostKind::General => "general",
        }
    }
}

/// Display filter only, not an access-control boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Public,
    ModeratorsOnly,
}

/// Review state of a concern post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcernStatus {
    New,
    Reviewing,
    Resolved,
}

/// Someone who joined an activity, keyed by `uid`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub uid: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
}

/// A feed post as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub kind: PostKind,
    pub author_id: String,
    pub author_display_name: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,

    #[serde(default)]
    pub upvote_count: u64,
    #[serde(default)]
    pub upvoted_by: Vec<String>,
    #[serde(default)]
    pub downvote_count: u64,
    #[serde(default)]
    pub downvoted_by: Vec<String>,
    #[serde(default)]
    pub support_count: u64,
    #[serde(default)]
    pub supported_by: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,

    // Activity
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub participants: Vec<Participant>,

    // Concern
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub status: Option<ConcernStatus>,
}

impl Post {
    pub fn is_activity(&self) -> bool {
        self.kind == PostKind::Activity
    }

    pub fn has_participant(&self, uid: &str) -> bool {
        self.participants.iter().any(|p| p.uid == uid)
    }

    /// True when a capacity is set and already reached
    pub fn is_full(&self) -> bool {
        self.max_participants
            .is_some_and(|max| self.participants.len() >= max as usize)
    }

    /// Net score shown next to dual-direction votes
    pub fn score(&self) -> i64 {
        self.upvote_count as i64 - self.downvote_count as i64
    }
}

/// Fields a user supplies when creating a post
#[derive(Debug, Clone, Default)]
pub struct NewPost {
    pub kind: Option<PostKind>,
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub visibility: Visibility,
    pub location: Option<String>,
    pub scheduled_date: Option<String>,
    pub scheduled_time: Option<String>,
    pub max_participants: Option<u32>,
    pub is_anonymous: bool,
}

impl NewPost {
    pub fn general(title: impl Into<String>, content: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            kind: Some(PostKind::General),
            title: title.into(),
            content: content.into(),
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn activity(title: impl Into<String>, content: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            kind: Some(PostKind::Activity),
            ..Self::general(title, content, category)
        }
    }

    pub fn concern(
        title: impl Into<String>,
        content: impl Into<String>,
        category: impl Into<String>,
        is_anonymous: bool,
    ) -> Self {
        Self {
            kind: Some(PostKind::Concern),
            is_anonymous,
            ..Self::general(title, content, category)
        }
    }

    /// Schedule as `YYYY-MM-DD` and `HH:MM`
    pub fn scheduled(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.scheduled_date = Some(date.into());
        self.scheduled_time = Some(time.into());
        self
    }

    pub fn with_capacity(mut self, max_participants: u32) -> Self {
        self.max_participants = Some(max_participants);
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn moderators_only(mut self) -> Self {
        self.visibility = Visibility::ModeratorsOnly;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_decodes_with_defaults() {
        let post: Post = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "createdAt": "2026-01-05T10:00:00Z",
            "kind": "activity",
            "authorId": "u1",
            "authorDisplayName": "Ana",
            "title": "Football",
            "category": "sports",
            "maxParticipants": 2
        }))
        .unwrap();

        assert!(post.is_activity());
        assert_eq!(post.visibility, Visibility::Public);
        assert!(post.participants.is_empty());
        assert!(!post.is_full());
        assert_eq!(post.score(), 0);
    }

    #[test]
    fn test_visibility_wire_name() {
        assert_eq!(
            serde_json::to_string(&Visibility::ModeratorsOnly).unwrap(),
            "\"moderators-only\""
        );
    }
}
