//! Convert submitted serde_json::Value cells to the text bound into form tables.

use serde_json::{Map, Value};

/// Prefix some older form builds put on table-row keys (`table_{column}`).
pub const LEGACY_COLUMN_PREFIX: &str = "table_";

/// Text form of a submitted value. Null stays NULL; strings are stored as-is;
/// numbers and booleans use their JSON spelling; arrays and objects are stored as JSON text.
pub fn text_value(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

/// Cell for `column` in one submitted table row: the bare key first, then the
/// legacy prefixed key. Null under the bare key falls through to the prefixed one.
pub fn row_cell(row: &Map<String, Value>, column: &str) -> Option<String> {
    let bare = row.get(column).filter(|v| !v.is_null());
    let cell = bare.or_else(|| row.get(&format!("{}{}", LEGACY_COLUMN_PREFIX, column)));
    cell.and_then(text_value)
}
