//! Drop a form's tables. Failures are collected per table; the operation itself never fails.

use crate::mapper::FormSchema;
use crate::sql::drop_table;
use serde::Serialize;
use sqlx::PgPool;

/// Result of dropping one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub dropped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TeardownManager;

impl TeardownManager {
    /// Child tables first, main table last. Without a layout only the main table is
    /// known and dropped; CASCADE removes the foreign keys of any child left behind.
    pub async fn drop_tables(
        pool: &PgPool,
        schema: &str,
        form_name: &str,
        layout: Option<&FormSchema>,
    ) -> Vec<TableOutcome> {
        let mut outcomes = Vec::new();
        for table in drop_order(form_name, layout) {
            let sql = drop_table(schema, &table);
            tracing::debug!(sql = %sql, "ddl");
            let outcome = match sqlx::query(&sql).execute(pool).await {
                Ok(_) => TableOutcome {
                    table,
                    dropped: true,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(form = %form_name, table = %table, error = %e, "drop table failed");
                    TableOutcome {
                        table,
                        dropped: false,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        tracing::info!(
            form = %form_name,
            dropped = outcomes.iter().filter(|o| o.dropped).count(),
            failed = outcomes.iter().filter(|o| !o.dropped).count(),
            "form tables dropped"
        );
        outcomes
    }
}

/// Table names in the order they are dropped.
pub fn drop_order(form_name: &str, layout: Option<&FormSchema>) -> Vec<String> {
    let mut tables: Vec<String> = layout
        .map(|l| l.child_tables.iter().map(|c| c.table_name(form_name)).collect())
        .unwrap_or_default();
    tables.push(form_name.to_string());
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ChildTable;

    #[test]
    fn children_are_dropped_before_the_main_table() {
        let layout = FormSchema {
            main_columns: vec!["full_name".into()],
            child_tables: vec![
                ChildTable { field_name: "dependents".into(), columns: vec!["name".into()] },
                ChildTable { field_name: "skills".into(), columns: vec!["skill".into()] },
            ],
        };
        assert_eq!(
            drop_order("employee_intake", Some(&layout)),
            ["employee_intake_dependents", "employee_intake_skills", "employee_intake"]
        );
        assert_eq!(drop_order("login", None), ["login"]);
    }

    #[test]
    fn outcome_omits_empty_error() {
        let ok = TableOutcome { table: "login".into(), dropped: true, error: None };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "table": "login", "dropped": true })
        );
    }
}
