//! Vote ledger
//!
//! A ledger is a set of user ids plus a counter that mirrors its size. Posts
//! carry an up/down pair, which is mutually exclusive per user, and a
//! single-direction support ledger. Wall issues carry only support.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{Commons, MAX_ATTEMPTS};
use crate::error::{Error, Result};
use crate::invariants;
use crate::storage::{Collection, Document, DocumentStore, Mutation, Precondition, UpdateOutcome};

/// Field names of one ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ledger {
    pub set: &'static str,
    pub count: &'static str,
}

pub(crate) const UPVOTES: Ledger = Ledger {
    set: "upvotedBy",
    count: "upvoteCount",
};

pub(crate) const DOWNVOTES: Ledger = Ledger {
    set: "downvotedBy",
    count: "downvoteCount",
};

pub(crate) const SUPPORT: Ledger = Ledger {
    set: "supportedBy",
    count: "supportCount",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Support,
}

impl Direction {
    pub(crate) fn ledger(&self) -> Ledger {
        match self {
            Direction::Up => UPVOTES,
            Direction::Down => DOWNVOTES,
            Direction::Support => SUPPORT,
        }
    }

    /// The mutually exclusive ledger, if any
    pub(crate) fn opposite(&self) -> Option<Ledger> {
        match self {
            Direction::Up => Some(DOWNVOTES),
            Direction::Down => Some(UPVOTES),
            Direction::Support => None,
        }
    }
}

/// Result of a completed vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    /// Whether the voter is now in the voted set
    pub voted: bool,
    /// Counter of the voted ledger after the write
    pub count: u64,
    /// Counter of the opposite ledger, for up/down votes
    pub opposite_count: Option<u64>,
}

fn contains(document: &Document, field: &str, user_id: &str) -> bool {
    document
        .field(field)
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(user_id)))
}

/// Build the guarded write that toggles `user_id` in the directed ledger.
///
/// The membership observed in `document` becomes a precondition, so the
/// store refuses the write if someone else's vote changed it first.
pub(crate) fn vote_mutation(document: &Document, user_id: &str, direction: Direction) -> (Mutation, bool) {
    let ledger = direction.ledger();
    let uid = Value::String(user_id.to_string());

    if contains(document, ledger.set, user_id) {
        let mutation = Mutation::new()
            .require(Precondition::ArrayContains {
                field: ledger.set.to_string(),
                value: uid.clone(),
            })
            .array_remove(ledger.set, uid)
            .increment(ledger.count, -1);
        return (mutation, false);
    }

    let mut mutation = Mutation::new()
        .require(Precondition::ArrayNotContains {
            field: ledger.set.to_string(),
            value: uid.clone(),
        })
        .array_union(ledger.set, uid.clone())
        .increment(ledger.count, 1);

    if let Some(opposite) = direction.opposite() {
        if contains(document, opposite.set, user_id) {
            mutation = mutation
                .require(Precondition::ArrayContains {
                    field: opposite.set.to_string(),
                    value: uid.clone(),
                })
                .array_remove(opposite.set, uid)
                .increment(opposite.count, -1);
        } else {
            mutation = mutation.require(Precondition::ArrayNotContains {
                field: opposite.set.to_string(),
                value: uid,
            });
        }
    }

    (mutation, true)
}

impl<S: DocumentStore> Commons<S> {
    /// Toggle the user's vote on an item, switching sides for up/down
    #[instrument(skip(self), fields(collection = %collection))]
    pub(crate) async fn apply_vote(
        &self,
        collection: Collection,
        item_id: &str,
        user_id: &str,
        direction: Direction,
    ) -> Result<VoteOutcome> {
        invariants::assert_user_id_valid(user_id, "apply_vote");

        for attempt in 1..=MAX_ATTEMPTS {
            let document = self
                .store
                .get(collection, item_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("{} {}", collection, item_id)))?;

            let (mutation, voted) = vote_mutation(&document, user_id, direction);

            match self.store.update(collection, item_id, mutation).await? {
                UpdateOutcome::Applied { document } => {
                    let ledger = direction.ledger();
                    invariants::assert_ledger_consistent(&document, ledger.count, ledger.set);
                    if let Some(opposite) = direction.opposite() {
                        invariants::assert_ledger_consistent(&document, opposite.count, opposite.set);
                        invariants::assert_votes_disjoint(&document, ledger.set, opposite.set);
                    }

                    debug!(voted, ?direction, "Vote recorded");
                    return Ok(VoteOutcome {
                        voted,
                        count: document.count(ledger.count),
                        opposite_count: direction.opposite().map(|o| document.count(o.count)),
                    });
                }
                UpdateOutcome::Rejected { failed } => {
                    debug!(attempt, ?failed, "Vote raced with another client, retrying");
                }
                UpdateOutcome::Missing => {
                    return Err(Error::NotFound(format!("{} {}", collection, item_id)));
                }
            }
        }

        Err(Error::Conflict(format!(
            "vote on {} kept changing underneath",
            item_id
        )))
    }
}
