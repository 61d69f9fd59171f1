//! SQLite document store for Commons

mod document;
mod migrations;
mod ops;
mod parse;
mod traits;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use parse::{check_field_name, format_datetime, json_to_sql, parse_datetime, parse_fields, OptionalExt};

pub use document::{
    encode, Collection, Document, FieldOp, Filter, Mutation, OrderBy, Precondition, Query,
    SortDirection, UpdateOutcome, CREATED_AT_FIELD,
};
pub use traits::DocumentStore;

/// Document store backed by a single SQLite connection.
///
/// Every operation takes the connection lock, and updates run inside a
/// transaction, so a guarded update is atomic with respect to all others.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    /// Open in-memory store (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn())?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        self.conn()
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap_or(0)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Store connection mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Insert a new document with a fresh id
    #[instrument(skip(self, fields), fields(collection = %collection))]
    pub fn create_document(
        &self,
        collection: Collection,
        mut fields: Map<String, Value>,
    ) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let stamp = format_datetime(created_at);
        fields.insert(CREATED_AT_FIELD.to_string(), Value::String(stamp.clone()));

        self.conn().execute(
            "INSERT INTO documents (collection, id, created_at, data) VALUES (?1, ?2, ?3, ?4)",
            params![
                collection.as_str(),
                id,
                stamp,
                serde_json::to_string(&fields)?
            ],
        )?;

        debug!(id = %id, "Document created");
        Ok(Document {
            id,
            created_at: parse_datetime(&format_datetime(created_at))?,
            fields,
        })
    }

    /// Create or replace a document, keeping the original creation time
    #[instrument(skip(self, fields), fields(collection = %collection))]
    pub fn put_document(
        &self,
        collection: Collection,
        id: &str,
        mut fields: Map<String, Value>,
    ) -> Result<Document> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT created_at FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| row.get(0),
            )
            .optional()?;
        let stamp = existing.unwrap_or_else(|| format_datetime(Utc::now()));
        fields.insert(CREATED_AT_FIELD.to_string(), Value::String(stamp.clone()));

        tx.execute(
            "INSERT INTO documents (collection, id, created_at, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data",
            params![
                collection.as_str(),
                id,
                stamp,
                serde_json::to_string(&fields)?
            ],
        )?;
        tx.commit()?;

        Ok(Document {
            id: id.to_string(),
            created_at: parse_datetime(&stamp)?,
            fields,
        })
    }

    /// Find a document by id
    #[instrument(skip(self), fields(collection = %collection))]
    pub fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let document = self
            .conn()
            .query_row(
                "SELECT id, created_at, data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                row_to_document,
            )
            .optional()?;

        Ok(document)
    }

    /// Check preconditions and apply field ops in one transaction
    #[instrument(skip(self, mutation), fields(collection = %collection, ops = mutation.ops.len()))]
    pub fn update_document(
        &self,
        collection: Collection,
        id: &str,
        mutation: &Mutation,
    ) -> Result<UpdateOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, created_at, data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                row_to_document,
            )
            .optional()?;

        let Some(mut document) = existing else {
            return Ok(UpdateOutcome::Missing);
        };

        if let Some(failed) = ops::first_failed(&document.fields, &mutation.preconditions) {
            debug!(?failed, "Precondition failed, update rejected");
            return Ok(UpdateOutcome::Rejected {
                failed: failed.clone(),
            });
        }

        ops::apply_all(&mut document.fields, &mutation.ops)?;

        tx.execute(
            "UPDATE documents SET data = ?1 WHERE collection = ?2 AND id = ?3",
            params![
                serde_json::to_string(&document.fields)?,
                collection.as_str(),
                id
            ],
        )?;
        tx.commit()?;

        Ok(UpdateOutcome::Applied { document })
    }

    /// Delete a document
    #[instrument(skip(self), fields(collection = %collection))]
    pub fn delete_document(&self, collection: Collection, id: &str) -> Result<bool> {
        let removed = self.conn().execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        Ok(removed > 0)
    }

    /// Run a filtered, ordered query
    #[instrument(skip(self, query), fields(collection = %query.collection))]
    pub fn query_documents(&self, query: &Query) -> Result<Vec<Document>> {
        let mut sql =
            String::from("SELECT id, created_at, data FROM documents WHERE collection = ?1");
        let mut values = vec![rusqlite::types::Value::Text(
            query.collection.as_str().to_string(),
        )];

        for filter in &query.filters {
            check_field_name(&filter.field)?;
            if filter.value.is_null() {
                sql.push_str(&format!(
                    " AND json_extract(data, '$.{}') IS NULL",
                    filter.field
                ));
            } else {
                values.push(json_to_sql(&filter.value));
                sql.push_str(&format!(
                    " AND json_extract(data, '$.{}') = ?{}",
                    filter.field,
                    values.len()
                ));
            }
        }

        let mut order_terms = Vec::with_capacity(query.order_by.len());
        for order in &query.order_by {
            check_field_name(&order.field)?;
            let column = if order.field == CREATED_AT_FIELD {
                "created_at".to_string()
            } else {
                format!("json_extract(data, '$.{}')", order.field)
            };
            order_terms.push(format!("{} {}", column, sql_direction(order.direction)));
        }
        // Documents created within the same microsecond keep insertion order
        if let Some(last) = query.order_by.last() {
            order_terms.push(format!("rowid {}", sql_direction(last.direction)));
        }
        if !order_terms.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_terms.join(", "));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params_from_iter(values.iter()), row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(documents)
    }
}

fn sql_direction(direction: SortDirection) -> &'static str {
    match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    }
}

fn row_to_document(row: &Row<'_>) -> std::result::Result<Document, rusqlite::Error> {
    Ok(Document {
        id: row.get(0)?,
        created_at: parse_datetime(&row.get::<_, String>(1)?)?,
        fields: parse_fields(&row.get::<_, String>(2)?)?,
    })
}

impl DocumentStore for SqliteStore {
    async fn create(&self, collection: Collection, fields: Map<String, Value>) -> Result<Document> {
        self.create_document(collection, fields)
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Document> {
        self.put_document(collection, id, fields)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        self.get_document(collection, id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> Result<UpdateOutcome> {
        self.update_document(collection, id, &mutation)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        self.delete_document(collection, id)
    }

    async fn query(&self, query: Query) -> Result<Vec<Document>> {
        self.query_documents(&query)
    }
}
