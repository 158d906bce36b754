// Row decoding helpers - every value read from the remote gateway passes
// through these before it becomes part of a typed model.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::gateway::JsonRow;

pub fn str_field<'a>(row: &'a JsonRow, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

pub fn string_field(row: &JsonRow, field: &str) -> Option<String> {
    str_field(row, field).map(str::to_string)
}

pub fn uuid_field(row: &JsonRow, field: &str) -> Option<Uuid> {
    str_field(row, field).and_then(|raw| Uuid::parse_str(raw.trim()).ok())
}

pub fn bool_field(row: &JsonRow, field: &str) -> Option<bool> {
    row.get(field).and_then(Value::as_bool)
}

pub fn i64_field(row: &JsonRow, field: &str) -> Option<i64> {
    row.get(field).and_then(Value::as_i64)
}

pub fn f64_field(row: &JsonRow, field: &str) -> Option<f64> {
    row.get(field).and_then(Value::as_f64)
}

pub fn datetime_field(row: &JsonRow, field: &str) -> Option<DateTime<Utc>> {
    str_field(row, field).and_then(parse_timestamp)
}

/// Array-of-strings column. Missing, null, or malformed values decode to an
/// empty list; non-string elements inside the array are skipped.
pub fn string_list_field(row: &JsonRow, field: &str) -> Vec<String> {
    match row.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Timestamps travel as RFC 3339 in UTC with microsecond precision, so
/// lexicographic order on the stored string matches chronological order.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Builds a `JsonRow` from a `json!({...})` object literal.
pub fn row_from_value(value: Value) -> JsonRow {
    match value {
        Value::Object(map) => map,
        _ => JsonRow::new(),
    }
}
