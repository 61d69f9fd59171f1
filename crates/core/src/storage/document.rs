//! Document store vocabulary
//!
//! Documents are schemaless JSON objects addressed by collection and id.
//! Updates are expressed as field operations guarded by preconditions, which
//! the store evaluates and applies as one atomic step per document.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field holding the store-assigned creation time
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Posts,
    MindWall,
    AnonymousComplaints,
    DepartmentComplaints,
    Users,
    Moderators,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Posts => "posts",
            Collection::MindWall => "mind_wall",
            Collection::AnonymousComplaints => "anonymous_complaints",
            Collection::DepartmentComplaints => "department_complaints",
            Collection::Users => "users",
            Collection::Moderators => "moderators",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Decode into a model, exposing `id` and `createdAt` alongside the fields
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        map.insert(
            CREATED_AT_FIELD.to_string(),
            serde_json::to_value(self.created_at)?,
        );
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Length of an array field, 0 when absent
    pub fn array_len(&self, name: &str) -> usize {
        self.fields
            .get(name)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Integer field, 0 when absent
    pub fn count(&self, name: &str) -> u64 {
        self.fields.get(name).and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Serialize a model into document fields.
///
/// `id` and `createdAt` are owned by the store and are stripped.
pub fn encode<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.remove("id");
            map.remove(CREATED_AT_FIELD);
            Ok(map)
        }
        other => Err(Error::ValidationFailed(format!(
            "Documents must be JSON objects, got {}",
            other
        ))),
    }
}

/// Atomic field operation applied during an update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldOp {
    /// Overwrite a field
    Set { field: String, value: Value },
    /// Add to a numeric field (missing counts as 0)
    Increment { field: String, by: i64 },
    /// Append each value not already present (set-add)
    ArrayUnion { field: String, values: Vec<Value> },
    /// Remove every element equal to one of the values (set-remove)
    ArrayRemove { field: String, values: Vec<Value> },
    /// Remove every object element whose `key` equals `value`
    ArrayRemoveWhere { field: String, key: String, value: Value },
}

/// Condition the stored document must satisfy for an update to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Precondition {
    /// Field equals the value (missing equals null)
    Equals { field: String, value: Value },
    /// Array field contains the value
    ArrayContains { field: String, value: Value },
    /// Array field does not contain the value
    ArrayNotContains { field: String, value: Value },
    /// No object element of the array has `key` equal to `value`
    ArrayNoneWhere { field: String, key: String, value: Value },
    /// Array field has fewer than `limit` elements
    ArrayLenBelow { field: String, limit: u64 },
}

/// A guarded update: every precondition must hold, then every op applies
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub preconditions: Vec<Precondition>,
    pub ops: Vec<FieldOp>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(FieldOp::Set {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn increment(mut self, field: &str, by: i64) -> Self {
        self.ops.push(FieldOp::Increment {
            field: field.to_string(),
            by,
        });
        self
    }

    pub fn array_union(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(FieldOp::ArrayUnion {
            field: field.to_string(),
            values: vec![value.into()],
        });
        self
    }

    pub fn array_remove(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.ops.push(FieldOp::ArrayRemove {
            field: field.to_string(),
            values: vec![value.into()],
        });
        self
    }

    pub fn array_remove_where(mut self, field: &str, key: &str, value: impl Into<Value>) -> Self {
        self.ops.push(FieldOp::ArrayRemoveWhere {
            field: field.to_string(),
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Result of a guarded update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Ops applied; carries the document as written
    Applied { document: Document },
    /// A precondition did not hold; nothing was written
    Rejected { failed: Precondition },
    /// No document with that id
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Equality filter on a top-level field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

/// Filtered, ordered collection query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: Collection,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl Query {
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn newest_first(self) -> Self {
        self.order_by(CREATED_AT_FIELD, SortDirection::Desc)
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}
