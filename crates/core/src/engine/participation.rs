//! Capacity-gated join and leave for activity posts

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{Commons, MAX_ATTEMPTS};
use crate::error::{Error, Result};
use crate::invariants;
use crate::models::{Participant, Post, PostKind};
use crate::storage::{Collection, DocumentStore, Mutation, Precondition, UpdateOutcome};

const PARTICIPANTS: &str = "participants";

impl<S: DocumentStore> Commons<S> {
    /// Join an activity as the signed-in user.
    ///
    /// The duplicate and capacity checks are sent with the write, so racing
    /// joins can never overfill an activity. A lost race is re-read and
    /// reported as `AlreadyJoined` or `ActivityFull`.
    #[instrument(skip(self))]
    pub async fn join_activity(&self, post_id: &str) -> Result<Post> {
        let session = self.session().await?;
        let uid = session.user_id();

        for attempt in 1..=MAX_ATTEMPTS {
            let post = self.get_post(post_id).await?;
            if !post.is_activity() {
                return Err(Error::NotAnActivity);
            }
            if post.has_participant(uid) {
                return Err(Error::AlreadyJoined);
            }
            if post.is_full() {
                return Err(Error::ActivityFull);
            }

            let participant = Participant {
                uid: uid.to_string(),
                display_name: session.display_name().to_string(),
                joined_at: Utc::now(),
            };

            let mut mutation = Mutation::new()
                .require(Precondition::Equals {
                    field: "kind".into(),
                    value: Value::from(PostKind::Activity.as_str()),
                })
                .require(Precondition::ArrayNoneWhere {
                    field: PARTICIPANTS.into(),
                    key: "uid".into(),
                    value: Value::from(uid),
                });
            if let Some(max) = post.max_participants {
                mutation = mutation.require(Precondition::ArrayLenBelow {
                    field: PARTICIPANTS.into(),
                    limit: u64::from(max),
                });
            }
            let mutation = mutation.array_union(PARTICIPANTS, serde_json::to_value(&participant)?);

            match self.store.update(Collection::Posts, post_id, mutation).await? {
                UpdateOutcome::Applied { document } => {
                    invariants::assert_participants_valid(&document);
                    info!(post_id, uid, "Joined activity");
                    return document.decode();
                }
                UpdateOutcome::Rejected { failed } => {
                    debug!(attempt, ?failed, "Join raced with another client, re-reading");
                }
                UpdateOutcome::Missing => {
                    return Err(Error::NotFound(format!("post {}", post_id)));
                }
            }
        }

        Err(Error::Conflict(format!("join on {} kept changing underneath", post_id)))
    }

    /// Leave an activity. Returns false if the user had not joined.
    #[instrument(skip(self))]
    pub async fn leave_activity(&self, post_id: &str) -> Result<bool> {
        let session = self.session().await?;
        let post = self.get_post(post_id).await?;
        if !post.has_participant(session.user_id()) {
            return Ok(false);
        }

        let mutation =
            Mutation::new().array_remove_where(PARTICIPANTS, "uid", session.user_id());
        match self.store.update(Collection::Posts, post_id, mutation).await? {
            UpdateOutcome::Applied { .. } => {
                info!(post_id, uid = %session.user_id(), "Left activity");
                Ok(true)
            }
            UpdateOutcome::Missing => Err(Error::NotFound(format!("post {}", post_id))),
            UpdateOutcome::Rejected { failed } => Err(Error::Conflict(format!(
                "unguarded leave rejected by {:?}",
                failed
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::*;
    use super::*;
    use crate::models::NewPost;

    async fn activity(client: &Client, capacity: Option<u32>) -> Post {
        let mut new = NewPost::activity("Hike", "Saturday", "outdoors");
        if let Some(max) = capacity {
            new = new.with_capacity(max);
        }
        client.commons.create_post(new).await.unwrap()
    }

    #[tokio::test]
    async fn test_join_until_full() {
        let store = store();
        let host = user(&store, "host");
        let post = activity(&host, Some(2)).await;

        let a = user(&store, "a");
        let b = user(&store, "b");
        let c = user(&store, "c");

        let joined = a.commons.join_activity(&post.id).await.unwrap();
        assert_eq!(joined.participants.len(), 1);
        assert_eq!(joined.participants[0].display_name, "A");
        b.commons.join_activity(&post.id).await.unwrap();

        let full = c.commons.join_activity(&post.id).await;
        assert!(matches!(full, Err(Error::ActivityFull)));
        assert_eq!(
            full.unwrap_err().user_message(),
            "This activity is full."
        );

        let again = a.commons.join_activity(&post.id).await;
        assert!(matches!(again, Err(Error::AlreadyJoined)));

        let stored = host.commons.get_post(&post.id).await.unwrap();
        assert_eq!(stored.participants.len(), 2);
    }

    #[tokio::test]
    async fn test_unlimited_activity() {
        let store = store();
        let host = user(&store, "host");
        let post = activity(&host, None).await;
        for i in 0..5 {
            user(&store, &format!("u{i}"))
                .commons
                .join_activity(&post.id)
                .await
                .unwrap();
        }
        assert_eq!(host.commons.get_post(&post.id).await.unwrap().participants.len(), 5);
    }

    #[tokio::test]
    async fn test_only_activities_can_be_joined() {
        let store = store();
        let host = user(&store, "host");
        let post = host
            .commons
            .create_post(NewPost::general("Chat", "", "social"))
            .await
            .unwrap();
        assert!(matches!(
            user(&store, "a").commons.join_activity(&post.id).await,
            Err(Error::NotAnActivity)
        ));
        assert!(matches!(
            user(&store, "a").commons.join_activity("missing").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_leave_is_idempotent() {
        let store = store();
        let host = user(&store, "host");
        let post = activity(&host, Some(1)).await;
        let a = user(&store, "a");

        assert!(!a.commons.leave_activity(&post.id).await.unwrap());
        a.commons.join_activity(&post.id).await.unwrap();
        assert!(a.commons.leave_activity(&post.id).await.unwrap());
        assert!(!a.commons.leave_activity(&post.id).await.unwrap());

        // The freed seat can be taken again
        user(&store, "b").commons.join_activity(&post.id).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_respect_capacity() {
        let store = store();
        let host = user(&store, "host");
        let post = activity(&host, Some(3)).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            let post_id = post.id.clone();
            handles.push(tokio::spawn(async move {
                let client = user(&store, &format!("racer{i}"));
                client.commons.join_activity(&post_id).await
            }));
        }

        let mut joined = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => joined += 1,
                Err(Error::ActivityFull) | Err(Error::Conflict(_)) => {}
                Err(other) => panic!("unexpected join failure: {other}"),
            }
        }

        let stored = host.commons.get_post(&post.id).await.unwrap();
        assert_eq!(joined, 3);
        assert_eq!(stored.participants.len(), 3);
    }
}
