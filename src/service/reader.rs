//! Read submissions back: main rows for listing, one main row with its child rows for display.

use crate::error::{is_undefined_column, is_undefined_table, SyncError};
use crate::mapper::FormSchema;
use crate::sql::{select_child_rows, select_record, select_records};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::PgPool;

pub struct RecordReader;

impl RecordReader {
    /// All main rows, newest first. A form whose table does not exist yet has no records.
    pub async fn list_records(pool: &PgPool, schema: &str, form_name: &str) -> Result<Vec<Value>, SyncError> {
        let sql = select_records(schema, form_name);
        tracing::debug!(sql = %sql, "query");
        match sqlx::query(&sql).fetch_all(pool).await {
            Ok(rows) => Ok(rows.iter().map(row_to_json).collect()),
            Err(e) if is_undefined_table(&e) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// One main row with every declared child table attached under its field name,
    /// rows in submission order. Missing child tables read as empty arrays; a missing
    /// main table or unknown session reads as None.
    pub async fn get_record(
        pool: &PgPool,
        schema: &str,
        form_name: &str,
        layout: &FormSchema,
        session_id: &str,
    ) -> Result<Option<Value>, SyncError> {
        let sql = select_record(schema, form_name);
        tracing::debug!(sql = %sql, session = %session_id, "query");
        let row = match sqlx::query(&sql).bind(session_id).fetch_optional(pool).await {
            Ok(row) => row,
            Err(e) if is_undefined_table(&e) => None,
            Err(e) => return Err(e.into()),
        };
        let Some(row) = row else {
            return Ok(None);
        };
        let mut record = row_to_json(&row);

        for child in &layout.child_tables {
            let table = child.table_name(form_name);
            let sql = select_child_rows(schema, &table, &child.columns);
            tracing::debug!(sql = %sql, session = %session_id, "query");
            let rows: Vec<Value> = match sqlx::query(&sql).bind(session_id).fetch_all(pool).await {
                Ok(rows) => rows.iter().map(row_to_json).collect(),
                Err(e) if is_undefined_table(&e) => Vec::new(),
                Err(e) if is_undefined_column(&e) => return Err(SyncError::SchemaMismatch(e.to_string())),
                Err(e) => return Err(e.into()),
            };
            if let Value::Object(map) = &mut record {
                map.insert(child.field_name.clone(), Value::Array(rows));
            }
        }
        Ok(Some(record))
    }
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

/// Form tables hold TEXT, INTEGER and TIMESTAMPTZ cells only.
fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    }
    Value::Null
}
