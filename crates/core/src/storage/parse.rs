//! Database value parsing utilities
//!
//! Provides error-safe parsing of stored values.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::Error as SqlError;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Format a timestamp with fixed width so text ordering matches time ordering
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse the JSON object stored in a `data` column
pub fn parse_fields(s: &str) -> std::result::Result<Map<String, Value>, SqlError> {
    serde_json::from_str(s).map_err(|e| {
        SqlError::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Field names are spliced into JSON paths, so only plain identifiers pass
pub fn check_field_name(field: &str) -> Result<()> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::ValidationFailed(format!("Invalid field name '{}'", field)))
    }
}

/// Convert a JSON filter value into the SQL value `json_extract` yields for it
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Extension trait for converting rusqlite Results to Option
pub trait OptionalExt<T> {
    fn optional(self) -> std::result::Result<Option<T>, SqlError>;
}

impl<T> OptionalExt<T> for std::result::Result<T, SqlError> {
    fn optional(self) -> std::result::Result<Option<T>, SqlError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(SqlError::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names() {
        assert!(check_field_name("supportCount").is_ok());
        assert!(check_field_name("max_participants").is_ok());
        assert!(check_field_name("").is_err());
        assert!(check_field_name("a') OR 1=1 --").is_err());
        assert!(check_field_name("nested.path").is_err());
    }

    #[test]
    fn test_formatted_timestamps_sort_lexically() {
        let earlier = parse_datetime("2026-01-05T10:00:00Z").unwrap();
        let later = parse_datetime("2026-01-05T10:00:00.5Z").unwrap();
        assert!(format_datetime(earlier) < format_datetime(later));
        assert_eq!(parse_datetime(&format_datetime(later)).unwrap(), later);
    }

    #[test]
    fn test_json_to_sql() {
        assert_eq!(json_to_sql(&json!(true)), SqlValue::Integer(1));
        assert_eq!(json_to_sql(&json!(3)), SqlValue::Integer(3));
        assert_eq!(json_to_sql(&json!("cs")), SqlValue::Text("cs".into()));
        assert_eq!(json_to_sql(&Value::Null), SqlValue::Null);
    }
}
