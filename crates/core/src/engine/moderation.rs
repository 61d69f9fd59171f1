//! Deletes behind the authorship-or-role gate

use serde_json::Value;
use tracing::{info, instrument};

use super::Commons;
use crate::error::{Error, Result};
use crate::permissions::{ensure, Action};
use crate::storage::{Collection, DocumentStore};

impl<S: DocumentStore> Commons<S> {
    /// Delete as the author, or as a moderator or admin.
    ///
    /// Deleting someone else's item re-checks the role against the directory.
    #[instrument(skip(self), fields(collection = %collection))]
    pub(crate) async fn delete_authored(&self, collection: Collection, item_id: &str) -> Result<()> {
        let session = self.session().await?;
        let document = self
            .store
            .get(collection, item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {}", collection, item_id)))?;
        let author_id = document
            .field("authorId")
            .and_then(Value::as_str)
            .unwrap_or_default();

        ensure(session.can_delete(author_id), "only the author or a moderator may delete this")?;
        if author_id != session.user_id() {
            self.privileged_session(Action::DeleteAnyContent).await?;
        }

        self.remove(collection, item_id).await?;
        info!(item_id, by = %session.user_id(), "Item deleted");
        Ok(())
    }

    /// Delete regardless of authorship. Moderators and admins only.
    #[instrument(skip(self), fields(collection = %collection))]
    pub(crate) async fn delete_moderated(&self, collection: Collection, item_id: &str) -> Result<()> {
        let session = self.privileged_session(Action::DeleteAnyContent).await?;
        self.remove(collection, item_id).await?;
        info!(item_id, by = %session.user_id(), role = %session.role(), "Item removed by moderation");
        Ok(())
    }

    async fn remove(&self, collection: Collection, item_id: &str) -> Result<()> {
        if self.store.delete(collection, item_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound(format!("{} {}", collection, item_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::error::Error;
    use crate::models::{Identity, NewMindWallIssue, NewPost, Role};

    #[tokio::test]
    async fn test_stranger_cannot_delete() {
        let store = store();
        let author = user(&store, "author");
        let stranger = user(&store, "stranger");
        let post = author
            .commons
            .create_post(NewPost::general("Mine", "", "social"))
            .await
            .unwrap();

        assert!(matches!(
            stranger.commons.delete_post(&post.id).await,
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            stranger.commons.delete_post_as_moderator(&post.id).await,
            Err(Error::Forbidden(_))
        ));
        assert_eq!(author.commons.list_posts(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_author_deletes_own_post() {
        let store = store();
        let author = user(&store, "author");
        let post = author
            .commons
            .create_post(NewPost::general("Mine", "", "social"))
            .await
            .unwrap();

        author.commons.delete_post(&post.id).await.unwrap();
        assert!(author.commons.list_posts(None).await.unwrap().is_empty());
        assert!(matches!(
            author.commons.delete_post(&post.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_moderator_deletes_any_post() {
        let store = store();
        let author = user(&store, "author");
        let moderator = client(&store, Identity::new("mod", "Mod", Role::Moderator));
        let first = author
            .commons
            .create_post(NewPost::general("One", "", "social"))
            .await
            .unwrap();
        let second = author
            .commons
            .create_post(NewPost::general("Two", "", "social"))
            .await
            .unwrap();

        moderator.commons.delete_post(&first.id).await.unwrap();
        moderator.commons.delete_post_as_moderator(&second.id).await.unwrap();
        assert!(author.commons.list_posts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wall_issue_delete_gate() {
        let store = store();
        let author = user(&store, "author");
        let stranger = user(&store, "stranger");
        let admin = client(&store, Identity::new("admin", "Admin", Role::Admin));
        let issue = author
            .commons
            .create_mind_wall_issue(NewMindWallIssue::new("Noise", "Library is loud", "campus"))
            .await
            .unwrap();

        assert!(matches!(
            stranger.commons.delete_mind_wall_issue(&issue.id).await,
            Err(Error::Forbidden(_))
        ));
        admin.commons.delete_mind_wall_issue(&issue.id).await.unwrap();
        assert!(author.commons.list_mind_wall_issues().await.unwrap().is_empty());
    }
}
