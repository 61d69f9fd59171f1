//! Feed posts: create, list, vote, comment, delete

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use super::{required, Commons, Direction, VoteOutcome};
use crate::error::{Error, Result};
use crate::models::{Comment, ConcernStatus, NewPost, Post, PostKind, Visibility};
use crate::permissions::Action;
use crate::storage::{encode, Collection, Document, DocumentStore, Mutation, Query, UpdateOutcome};

impl<S: DocumentStore> Commons<S> {
    /// Create a post authored by the signed-in user
    #[instrument(skip(self, new), fields(kind = ?new.kind))]
    pub async fn create_post(&self, new: NewPost) -> Result<Post> {
        let session = self.session().await?;
        let title = required(&new.title, "Title")?;
        let category = required(&new.category, "Category")?;
        if new.max_participants == Some(0) {
            return Err(Error::ValidationFailed(
                "Maximum participants must be positive".into(),
            ));
        }

        let kind = new.kind.unwrap_or(PostKind::General);
        let is_activity = kind == PostKind::Activity;
        let is_anonymous = kind == PostKind::Concern && new.is_anonymous;
        let author_display_name = if is_anonymous {
            self.settings.anonymous_label.clone()
        } else {
            session.display_name().to_string()
        };

        let post = Post {
            id: String::new(),
            created_at: Utc::now(),
            kind,
            author_id: session.user_id().to_string(),
            author_display_name,
            title,
            content: new.content.trim().to_string(),
            category,
            tags: new.tags,
            image_url: new.image_url,
            visibility: new.visibility,
            upvote_count: 0,
            upvoted_by: Vec::new(),
            downvote_count: 0,
            downvoted_by: Vec::new(),
            support_count: 0,
            supported_by: Vec::new(),
            comments: Vec::new(),
            location: new.location.filter(|_| is_activity),
            scheduled_date: new.scheduled_date.filter(|_| is_activity),
            scheduled_time: new.scheduled_time.filter(|_| is_activity),
            max_participants: new.max_participants.filter(|_| is_activity),
            participants: Vec::new(),
            is_anonymous,
            status: (kind == PostKind::Concern).then_some(ConcernStatus::New),
        };

        let document = self.store.create(Collection::Posts, encode(&post)?).await?;
        info!(post_id = %document.id, kind = kind.as_str(), "Post created");
        document.decode()
    }

    /// Point read
    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        self.store
            .get(Collection::Posts, post_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("post {}", post_id)))?
            .decode()
    }

    /// All posts, newest first, optionally of one kind
    pub async fn list_posts(&self, kind: Option<PostKind>) -> Result<Vec<Post>> {
        let mut query = Query::collection(Collection::Posts).newest_first();
        if let Some(kind) = kind {
            query = query.where_eq("kind", kind.as_str());
        }
        let documents = self.store.query(query).await?;
        Ok(decode_all(&documents))
    }

    /// Posts the signed-in viewer should see.
    ///
    /// Moderator-only posts are shown to moderators, admins and their author.
    pub async fn list_posts_for_viewer(&self, kind: Option<PostKind>) -> Result<Vec<Post>> {
        let session = match self.identity.current() {
            Some(_) => Some(self.session().await?),
            None => None,
        };
        let sees_all = session
            .as_ref()
            .is_some_and(|s| s.can(Action::ViewModeratorPosts));

        let posts = self.list_posts(kind).await?;
        Ok(posts
            .into_iter()
            .filter(|post| {
                post.visibility == Visibility::Public
                    || sees_all
                    || session.as_ref().is_some_and(|s| s.user_id() == post.author_id)
            })
            .collect())
    }

    /// Toggle an upvote, withdrawing any downvote
    pub async fn vote_up(&self, post_id: &str) -> Result<VoteOutcome> {
        self.vote_post(post_id, Direction::Up).await
    }

    /// Toggle a downvote, withdrawing any upvote
    pub async fn vote_down(&self, post_id: &str) -> Result<VoteOutcome> {
        self.vote_post(post_id, Direction::Down).await
    }

    /// Toggle support on a post
    pub async fn toggle_support(&self, post_id: &str) -> Result<VoteOutcome> {
        self.vote_post(post_id, Direction::Support).await
    }

    async fn vote_post(&self, post_id: &str, direction: Direction) -> Result<VoteOutcome> {
        let identity = self.identity()?;
        if !self.debouncer.try_acquire(post_id) {
            return Err(Error::RateLimited);
        }
        self.apply_vote(Collection::Posts, post_id, &identity.id, direction)
            .await
    }

    /// Append a comment to a post
    pub async fn add_comment(&self, post_id: &str, text: &str, anonymous: bool) -> Result<Comment> {
        self.append_comment(Collection::Posts, post_id, text, anonymous)
            .await
    }

    /// Delete a post as its author, or as a moderator or admin
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        self.delete_authored(Collection::Posts, post_id).await
    }

    /// Delete any post. Requires the moderator or admin role.
    pub async fn delete_post_as_moderator(&self, post_id: &str) -> Result<()> {
        self.delete_moderated(Collection::Posts, post_id).await
    }

    #[instrument(skip(self, text), fields(collection = %collection))]
    pub(crate) async fn append_comment(
        &self,
        collection: Collection,
        item_id: &str,
        text: &str,
        anonymous: bool,
    ) -> Result<Comment> {
        let session = self.session().await?;
        let text = required(text, "Comment")?;

        let comment = if anonymous {
            Comment::anonymous(
                session.user_id().to_string(),
                &self.settings.anonymous_label,
                text,
            )
        } else {
            Comment::new(
                session.user_id().to_string(),
                session.display_name().to_string(),
                text,
            )
        };

        let mutation = Mutation::new().array_union("comments", serde_json::to_value(&comment)?);
        match self.store.update(collection, item_id, mutation).await? {
            UpdateOutcome::Applied { .. } => Ok(comment),
            UpdateOutcome::Missing => Err(Error::NotFound(format!("{} {}", collection, item_id))),
            UpdateOutcome::Rejected { failed } => Err(Error::Conflict(format!(
                "unguarded comment rejected by {:?}",
                failed
            ))),
        }
    }
}

/// Decode documents, skipping (and logging) any that no longer match the model
pub(crate) fn decode_all<T: DeserializeOwned>(documents: &[Document]) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}
