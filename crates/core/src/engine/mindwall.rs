//! Mind wall: support-only issues ranked by support

use chrono::Utc;
use tracing::{debug, info, instrument};

use super::feed::decode_all;
use super::{required, Commons, Direction, VoteOutcome};
use crate::error::{Error, Result};
use crate::models::{Comment, MindWallIssue, NewMindWallIssue};
use crate::storage::{encode, Collection, DocumentStore, Query, SortDirection, CREATED_AT_FIELD};

impl<S: DocumentStore> Commons<S> {
    /// Create an issue. The author is its first supporter.
    #[instrument(skip(self, new))]
    pub async fn create_mind_wall_issue(&self, new: NewMindWallIssue) -> Result<MindWallIssue> {
        let session = self.session().await?;
        let title = required(&new.title, "Title")?;
        let category = required(&new.category, "Category")?;

        let author_display_name = if new.is_anonymous {
            self.settings.anonymous_label.clone()
        } else {
            session.display_name().to_string()
        };

        let issue = MindWallIssue {
            id: String::new(),
            created_at: Utc::now(),
            author_id: session.user_id().to_string(),
            author_display_name,
            title,
            description: new.description.trim().to_string(),
            category,
            is_anonymous: new.is_anonymous,
            support_count: 1,
            supported_by: vec![session.user_id().to_string()],
            comments: Vec::new(),
        };

        let document = self.store.create(Collection::MindWall, encode(&issue)?).await?;
        info!(issue_id = %document.id, "Wall issue created");
        document.decode()
    }

    /// Issues by support, most supported first, ties newest first
    pub async fn list_mind_wall_issues(&self) -> Result<Vec<MindWallIssue>> {
        let query = Query::collection(Collection::MindWall)
            .order_by("supportCount", SortDirection::Desc)
            .order_by(CREATED_AT_FIELD, SortDirection::Desc);
        let documents = self.store.query(query).await?;
        Ok(decode_all(&documents))
    }

    /// Toggle support. A repeat inside the debounce window is dropped
    /// silently and yields `None`.
    pub async fn vote_mind_wall_issue(&self, issue_id: &str) -> Result<Option<VoteOutcome>> {
        let identity = self.identity()?;
        if !self.debouncer.try_acquire(issue_id) {
            debug!(issue_id, "Wall vote debounced");
            return Ok(None);
        }
        self.apply_vote(Collection::MindWall, issue_id, &identity.id, Direction::Support)
            .await
            .map(Some)
    }

    pub async fn add_mind_wall_comment(
        &self,
        issue_id: &str,
        text: &str,
        anonymous: bool,
    ) -> Result<Comment> {
        self.append_comment(Collection::MindWall, issue_id, text, anonymous)
            .await
    }

    /// Delete as the author, or as a moderator or admin
    pub async fn delete_mind_wall_issue(&self, issue_id: &str) -> Result<()> {
        self.delete_authored(Collection::MindWall, issue_id).await
    }

    /// Point read
    pub async fn get_mind_wall_issue(&self, issue_id: &str) -> Result<MindWallIssue> {
        self.store
            .get(Collection::MindWall, issue_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("wall issue {}", issue_id)))?
            .decode()
    }
}
