//! Write one submission: upsert the main row, then replace each child table's rows for the session.

use crate::error::{is_undefined_column, is_undefined_table, SyncError};
use crate::mapper::{ChildTable, FormSchema};
use crate::payload::Submission;
use crate::sql::{delete_child_rows, insert_child_row, row_cell, text_value, upsert_main, QueryBuf};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;

/// What one synchronize call wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub form_name: String,
    pub session_id: String,
    /// Main-table columns written (fixed columns excluded).
    pub columns_written: usize,
    /// Rows inserted per replaced child table, keyed by field name. Tables whose field
    /// was absent from the payload are left untouched and do not appear.
    pub child_rows: BTreeMap<String, usize>,
}

/// Rows to write into one child table.
#[derive(Debug)]
pub struct ChildPlan<'a> {
    pub child: &'a ChildTable,
    pub rows: &'a [Value],
}

pub struct RecordSynchronizer;

impl RecordSynchronizer {
    /// Upsert the main row and replace child rows in one transaction. The upsert takes the
    /// session's row lock first, so concurrent calls for the same session apply one after
    /// the other and readers never see a half-replaced child set.
    pub async fn synchronize(
        pool: &PgPool,
        schema: &str,
        layout: &FormSchema,
        submission: &Submission,
    ) -> Result<SyncSummary, SyncError> {
        let plan = plan_children(layout, submission)?;
        let values = main_values(layout, submission);
        let form_name = submission.form_name.as_str();
        let session_id = submission.session_id.as_str();

        let mut tx = pool.begin().await?;
        let upsert = upsert_main(
            schema,
            form_name,
            session_id,
            &submission.submitted_at_rfc3339(),
            &values,
        );
        Self::execute(&mut tx, &upsert).await?;

        let mut child_rows = BTreeMap::new();
        for ChildPlan { child, rows } in plan {
            let table = child.table_name(form_name);
            Self::execute(&mut tx, &delete_child_rows(schema, &table, session_id)).await?;

            for (row_index, row) in rows.iter().enumerate() {
                let q = insert_child_row(
                    schema,
                    &table,
                    &child.columns,
                    session_id,
                    row_index,
                    child_values(child, row),
                );
                Self::execute(&mut tx, &q).await?;
            }
            child_rows.insert(child.field_name.clone(), rows.len());
        }
        tx.commit().await?;

        Ok(SyncSummary {
            form_name: form_name.to_string(),
            session_id: session_id.to_string(),
            columns_written: values.len(),
            child_rows,
        })
    }

    async fn execute(tx: &mut PgConnection, q: &QueryBuf) -> Result<(), SyncError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.as_deref());
        }
        match query.execute(&mut *tx).await {
            Ok(_) => Ok(()),
            // Tables are never altered, so a field added after provisioning has no column or table.
            Err(e) if is_undefined_column(&e) || is_undefined_table(&e) => {
                Err(SyncError::SchemaMismatch(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Mapped scalar columns present in the payload, with their text values. Absent fields
/// are not listed, so an update leaves those columns as they were.
pub fn main_values(layout: &FormSchema, submission: &Submission) -> Vec<(String, Option<String>)> {
    layout
        .main_columns
        .iter()
        .filter_map(|col| submission.value(col).map(|v| (col.clone(), text_value(v))))
        .collect()
}

/// Cells of one submitted row in declared column order. Non-object rows yield all NULLs.
pub fn child_values(child: &ChildTable, row: &Value) -> Vec<Option<String>> {
    match row.as_object() {
        Some(row) => child.columns.iter().map(|c| row_cell(row, c)).collect(),
        None => vec![None; child.columns.len()],
    }
}

/// Match declared table fields to payload arrays by exact name.
///
/// - array under the field name: replace rows (an empty array clears them)
/// - field absent or null: leave the child table untouched, unless the payload carries
///   arrays under undeclared keys, which is reported as a mismatch rather than guessed at
/// - any other value under the field name: mismatch
///
/// Undeclared arrays are ignored when every declared field matched.
pub fn plan_children<'a>(
    layout: &'a FormSchema,
    submission: &'a Submission,
) -> Result<Vec<ChildPlan<'a>>, SyncError> {
    let undeclared: Vec<&str> = submission
        .values
        .iter()
        .filter(|(k, v)| v.is_array() && layout.child(k).is_none() && !layout.has_main_column(k))
        .map(|(k, _)| k.as_str())
        .collect();

    let mut plan = Vec::with_capacity(layout.child_tables.len());
    for child in &layout.child_tables {
        match submission.value(&child.field_name) {
            Some(Value::Array(rows)) => plan.push(ChildPlan { child, rows }),
            None | Some(Value::Null) if undeclared.is_empty() => {
                tracing::debug!(form = %submission.form_name, field = %child.field_name, "table field absent; rows kept");
            }
            None | Some(Value::Null) => {
                return Err(SyncError::SchemaMismatch(format!(
                    "table field '{}' is missing from the payload, which has undeclared arrays: {}",
                    child.field_name,
                    undeclared.join(", ")
                )));
            }
            Some(_) => {
                return Err(SyncError::SchemaMismatch(format!(
                    "table field '{}' must be an array of rows",
                    child.field_name
                )));
            }
        }
    }
    if !undeclared.is_empty() {
        tracing::debug!(form = %submission.form_name, keys = ?undeclared, "undeclared arrays ignored");
    }
    Ok(plan)
}
