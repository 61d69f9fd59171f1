//! Evaluation of preconditions and field operations on document fields

use serde_json::{Map, Value};

use super::document::{FieldOp, Precondition};
use crate::error::{Error, Result};

/// Returns the first precondition that does not hold, if any
pub fn first_failed<'a>(
    fields: &Map<String, Value>,
    preconditions: &'a [Precondition],
) -> Option<&'a Precondition> {
    preconditions.iter().find(|p| !holds(fields, p))
}

fn holds(fields: &Map<String, Value>, precondition: &Precondition) -> bool {
    match precondition {
        Precondition::Equals { field, value } => {
            fields.get(field).unwrap_or(&Value::Null) == value
        }
        Precondition::ArrayContains { field, value } => array(fields, field).contains(value),
        Precondition::ArrayNotContains { field, value } => !array(fields, field).contains(value),
        Precondition::ArrayNoneWhere { field, key, value } => !array(fields, field)
            .iter()
            .any(|element| element.get(key) == Some(value)),
        Precondition::ArrayLenBelow { field, limit } => (array(fields, field).len() as u64) < *limit,
    }
}

fn array<'a>(fields: &'a Map<String, Value>, field: &str) -> &'a [Value] {
    fields
        .get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Apply all ops in order. Stops at the first op that cannot apply.
pub fn apply_all(fields: &mut Map<String, Value>, ops: &[FieldOp]) -> Result<()> {
    for op in ops {
        apply(fields, op)?;
    }
    Ok(())
}

fn apply(fields: &mut Map<String, Value>, op: &FieldOp) -> Result<()> {
    match op {
        FieldOp::Set { field, value } => {
            fields.insert(field.clone(), value.clone());
        }
        FieldOp::Increment { field, by } => {
            let current = match fields.get(field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    Error::ValidationFailed(format!("Field '{}' is not an integer", field))
                })?,
            };
            fields.insert(field.clone(), Value::from(current + by));
        }
        FieldOp::ArrayUnion { field, values } => {
            let items = array_mut(fields, field)?;
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
        FieldOp::ArrayRemove { field, values } => {
            let items = array_mut(fields, field)?;
            items.retain(|item| !values.contains(item));
        }
        FieldOp::ArrayRemoveWhere { field, key, value } => {
            let items = array_mut(fields, field)?;
            items.retain(|item| item.get(key) != Some(value));
        }
    }
    Ok(())
}

fn array_mut<'a>(fields: &'a mut Map<String, Value>, field: &str) -> Result<&'a mut Vec<Value>> {
    let slot = fields
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut()
        .ok_or_else(|| Error::ValidationFailed(format!("Field '{}' is not an array", field)))
}
