//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::storage::Document;

/// A counter must equal the size of the set it summarizes
pub fn assert_ledger_consistent(document: &Document, count_field: &str, set_field: &str) {
    debug_assert!(
        document.count(count_field) as usize == document.array_len(set_field),
        "Document {} has {} = {} but {} holds {} ids",
        document.id,
        count_field,
        document.count(count_field),
        set_field,
        document.array_len(set_field)
    );
}

/// No user may be in both sets of a dual-direction ledger
pub fn assert_votes_disjoint(document: &Document, first_set: &str, second_set: &str) {
    let first = string_set(document, first_set);
    let both: Vec<&str> = string_set(document, second_set)
        .intersection(&first)
        .copied()
        .collect();
    debug_assert!(
        both.is_empty(),
        "Document {} has users {:?} in both {} and {}",
        document.id,
        both,
        first_set,
        second_set
    );
}

/// Participants are unique by uid and within capacity
pub fn assert_participants_valid(document: &Document) {
    let uids: Vec<&str> = document
        .field("participants")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("uid").and_then(|u| u.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let unique: HashSet<&str> = uids.iter().copied().collect();
    debug_assert!(
        unique.len() == uids.len(),
        "Document {} has duplicate participants",
        document.id
    );

    if let Some(max) = document.field("maxParticipants").and_then(|v| v.as_u64()) {
        debug_assert!(
            uids.len() as u64 <= max,
            "Document {} has {} participants, capacity {}",
            document.id,
            uids.len(),
            max
        );
    }
}

/// Validate that a user ID is not empty
pub fn assert_user_id_valid(user_id: &str, context: &str) {
    debug_assert!(
        !user_id.trim().is_empty(),
        "Empty user_id in context: {}",
        context
    );
}

fn string_set<'a>(document: &'a Document, field: &str) -> HashSet<&'a str> {
    document
        .field(field)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn document(fields: serde_json::Value) -> Document {
        Document {
            id: "doc".into(),
            created_at: Utc::now(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_consistent_ledger() {
        let doc = document(json!({ "supportCount": 2, "supportedBy": ["a", "b"] }));
        assert_ledger_consistent(&doc, "supportCount", "supportedBy");
    }

    #[test]
    #[should_panic(expected = "holds 1 ids")]
    fn test_drifted_counter() {
        let doc = document(json!({ "supportCount": 2, "supportedBy": ["a"] }));
        assert_ledger_consistent(&doc, "supportCount", "supportedBy");
    }

    #[test]
    #[should_panic(expected = "in both")]
    fn test_overlapping_votes() {
        let doc = document(json!({ "upvotedBy": ["a"], "downvotedBy": ["a"] }));
        assert_votes_disjoint(&doc, "upvotedBy", "downvotedBy");
    }

    #[test]
    fn test_valid_participants() {
        let doc = document(json!({
            "maxParticipants": 2,
            "participants": [{ "uid": "a" }, { "uid": "b" }]
        }));
        assert_participants_valid(&doc);
    }

    #[test]
    #[should_panic(expected = "capacity 1")]
    fn test_over_capacity() {
        let doc = document(json!({
            "maxParticipants": 1,
            "participants": [{ "uid": "a" }, { "uid": "b" }]
        }));
        assert_participants_valid(&doc);
    }
}
