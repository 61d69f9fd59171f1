//! Storage interface
//!
//! The engine talks to documents only through this trait, so the same rules
//! run against the local SQLite store or a remote store over the network.

use std::future::Future;

use serde_json::{Map, Value};

use super::document::{Collection, Document, Mutation, Query, UpdateOutcome};
use crate::error::Result;

/// Per-document CRUD store with atomic guarded updates.
///
/// There are no multi-document transactions. A single `update` is atomic:
/// its preconditions are checked and its ops applied against the same
/// version of the document.
pub trait DocumentStore: Send + Sync {
    /// Create a document with a store-assigned id and creation time
    fn create(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<Document>> + Send;

    /// Create or replace the document with the given id
    fn put(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> impl Future<Output = Result<Document>> + Send;

    /// Point read
    fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<Option<Document>>> + Send;

    /// Guarded point update
    fn update(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> impl Future<Output = Result<UpdateOutcome>> + Send;

    /// Point delete. Returns false if the document did not exist.
    fn delete(&self, collection: Collection, id: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Filtered, ordered collection query
    fn query(&self, query: Query) -> impl Future<Output = Result<Vec<Document>>> + Send;
}
