//! Derive the relational layout of a form from its spec: one main table of scalar
//! columns and one child table per `table` field.

use crate::spec::{FieldKind, FormSpec};
use serde::{Deserialize, Serialize};

/// Fixed main-table columns; spec fields with these names are not mapped.
pub const MAIN_TABLE_COLUMNS: &[&str] = &["session_id", "submitted_at"];

/// Fixed child-table columns; table columns with these names are not mapped.
pub const CHILD_TABLE_COLUMNS: &[&str] = &["id", "session_id", "row_index"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildTable {
    /// Name of the originating table field; the table is `{form}_{field_name}`.
    pub field_name: String,
    pub columns: Vec<String>,
}

impl ChildTable {
    pub fn table_name(&self, form_name: &str) -> String {
        child_table_name(form_name, &self.field_name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormSchema {
    pub main_columns: Vec<String>,
    pub child_tables: Vec<ChildTable>,
}

impl FormSchema {
    pub fn child(&self, field_name: &str) -> Option<&ChildTable> {
        self.child_tables.iter().find(|c| c.field_name == field_name)
    }

    pub fn has_main_column(&self, name: &str) -> bool {
        self.main_columns.iter().any(|c| c == name)
    }

    /// This layout plus the child tables of `other` it does not already have.
    pub fn with_children_of(mut self, other: &FormSchema) -> FormSchema {
        for child in &other.child_tables {
            if self.child(&child.field_name).is_none() {
                self.child_tables.push(child.clone());
            }
        }
        self
    }
}

pub fn child_table_name(form_name: &str, field_name: &str) -> String {
    format!("{}_{}", form_name, field_name)
}

/// Map a spec to its table layout. Declaration order is kept; the first of any
/// duplicate name wins.
pub fn map_schema(spec: &FormSpec) -> FormSchema {
    let mut schema = FormSchema::default();

    for field in spec.fields() {
        let Some(name) = field.field_name() else {
            continue;
        };
        if field.kind == FieldKind::Table {
            if schema.child(name).is_some() {
                tracing::warn!(form = %spec.form_name, field = %name, "duplicate table field ignored");
                continue;
            }
            let mut columns: Vec<String> = Vec::new();
            for col in &field.columns {
                let Some(col_name) = col.name.as_deref().filter(|n| !n.is_empty()) else {
                    tracing::debug!(form = %spec.form_name, field = %name, "unnamed table column dropped");
                    continue;
                };
                if CHILD_TABLE_COLUMNS.contains(&col_name) || columns.iter().any(|c| c == col_name) {
                    tracing::warn!(form = %spec.form_name, field = %name, column = %col_name, "table column skipped");
                    continue;
                }
                columns.push(col_name.to_string());
            }
            if !columns.is_empty() {
                schema.child_tables.push(ChildTable {
                    field_name: name.to_string(),
                    columns,
                });
            }
        } else if field.kind.is_scalar() {
            if MAIN_TABLE_COLUMNS.contains(&name) || schema.has_main_column(name) {
                tracing::warn!(form = %spec.form_name, field = %name, "scalar field skipped");
                continue;
            }
            schema.main_columns.push(name.to_string());
        }
    }

    schema
}
