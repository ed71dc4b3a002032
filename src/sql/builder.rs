//! Builds DDL and parameterized DML for a form's main and child tables.

use crate::ident::MAX_IDENTIFIER_LEN;
use crate::mapper::{ChildTable, FormSchema};
use uuid::Uuid;

/// Quote identifier for PostgreSQL (safe: names are validated before they reach the builder).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// SQL text plus positional parameters. Every parameter is bound as text;
/// typed columns cast in SQL (`$n::timestamptz`, `$n::integer`).
#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Option<String>>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: Option<String>) -> u32 {
        self.params.push(v);
        self.params.len() as u32
    }
}

/// CREATE TABLE IF NOT EXISTS for the main table: session key, submission time, one TEXT column per scalar field.
pub fn create_main_table(schema: &str, form_name: &str, columns: &[String]) -> String {
    let mut col_defs = vec![
        format!("{} TEXT PRIMARY KEY", quoted("session_id")),
        format!("{} TIMESTAMPTZ", quoted("submitted_at")),
    ];
    col_defs.extend(columns.iter().map(|c| format!("{} TEXT", quoted(c))));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(schema, form_name),
        col_defs.join(",\n  ")
    )
}

/// CREATE TABLE IF NOT EXISTS for one child table, linked to the main table with cascading delete.
pub fn create_child_table(schema: &str, form_name: &str, child: &ChildTable) -> String {
    let mut col_defs = vec![
        format!("{} SERIAL PRIMARY KEY", quoted("id")),
        format!(
            "{} TEXT REFERENCES {} ({}) ON DELETE CASCADE",
            quoted("session_id"),
            qualified_table(schema, form_name),
            quoted("session_id")
        ),
        format!("{} INTEGER", quoted("row_index")),
    ];
    col_defs.extend(child.columns.iter().map(|c| format!("{} TEXT", quoted(c))));
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(schema, &child.table_name(form_name)),
        col_defs.join(",\n  ")
    )
}

/// Index serving the per-session delete and the ordered read of a child table.
pub fn create_child_index(schema: &str, form_name: &str, child: &ChildTable) -> String {
    let table = child.table_name(form_name);
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
        quoted(&child_index_name(&table)),
        qualified_table(schema, &table),
        quoted("session_id"),
        quoted("row_index")
    )
}

/// `{table}_session_idx`. Past the identifier limit, a table prefix plus a digest of the
/// full table name, so long names neither truncate onto the table's name nor collide.
pub fn child_index_name(table: &str) -> String {
    let name = format!("{}_session_idx", table);
    if name.len() <= MAX_IDENTIFIER_LEN {
        return name;
    }
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, table.as_bytes()).simple().to_string();
    let suffix = format!("_{}_idx", &digest[..8]);
    let keep = MAX_IDENTIFIER_LEN - suffix.len();
    format!("{}{}", table.get(..keep).unwrap_or(table), suffix)
}

/// All DDL for a form, in dependency order: main table first, then each child table and its index.
pub fn form_ddl(schema: &str, form_name: &str, layout: &FormSchema) -> Vec<String> {
    let mut out = vec![create_main_table(schema, form_name, &layout.main_columns)];
    for child in &layout.child_tables {
        out.push(create_child_table(schema, form_name, child));
        out.push(create_child_index(schema, form_name, child));
    }
    out
}

/// INSERT ... ON CONFLICT (session_id) DO UPDATE: every listed column is overwritten with the new value.
/// `submitted_at` is an RFC 3339 string.
pub fn upsert_main(
    schema: &str,
    form_name: &str,
    session_id: &str,
    submitted_at: &str,
    values: &[(String, Option<String>)],
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = vec![quoted("session_id"), quoted("submitted_at")];
    let mut placeholders = vec![
        format!("${}", q.push_param(Some(session_id.to_string()))),
        format!("${}::timestamptz", q.push_param(Some(submitted_at.to_string()))),
    ];
    for (name, value) in values {
        let n = q.push_param(value.clone());
        cols.push(quoted(name));
        placeholders.push(format!("${}", n));
    }
    let updates: Vec<String> = cols
        .iter()
        .skip(1)
        .map(|c| format!("{} = EXCLUDED.{}", c, c))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
        qualified_table(schema, form_name),
        cols.join(", "),
        placeholders.join(", "),
        quoted("session_id"),
        updates.join(", ")
    );
    q
}

/// DELETE every row of a child table for one session.
pub fn delete_child_rows(schema: &str, table: &str, session_id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let n = q.push_param(Some(session_id.to_string()));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = ${}",
        qualified_table(schema, table),
        quoted("session_id"),
        n
    );
    q
}

/// INSERT one child row tagged with its position in the submitted array.
pub fn insert_child_row(
    schema: &str,
    table: &str,
    columns: &[String],
    session_id: &str,
    row_index: usize,
    values: Vec<Option<String>>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = vec![quoted("session_id"), quoted("row_index")];
    let mut placeholders = vec![
        format!("${}", q.push_param(Some(session_id.to_string()))),
        format!("${}::integer", q.push_param(Some(row_index.to_string()))),
    ];
    for (name, value) in columns.iter().zip(values) {
        let n = q.push_param(value);
        cols.push(quoted(name));
        placeholders.push(format!("${}", n));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified_table(schema, table),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// SELECT all main rows, newest submission first.
pub fn select_records(schema: &str, form_name: &str) -> String {
    format!(
        "SELECT * FROM {} ORDER BY {} DESC NULLS LAST, {}",
        qualified_table(schema, form_name),
        quoted("submitted_at"),
        quoted("session_id")
    )
}

/// SELECT one main row. Caller binds session id as $1.
pub fn select_record(schema: &str, form_name: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = $1",
        qualified_table(schema, form_name),
        quoted("session_id")
    )
}

/// SELECT a session's child rows in submission order. Caller binds session id as $1.
pub fn select_child_rows(schema: &str, table: &str, columns: &[String]) -> String {
    let mut cols = vec![quoted("row_index")];
    cols.extend(columns.iter().map(|c| quoted(c)));
    format!(
        "SELECT {} FROM {} WHERE {} = $1 ORDER BY {}, {}",
        cols.join(", "),
        qualified_table(schema, table),
        quoted("session_id"),
        quoted("row_index"),
        quoted("id")
    )
}

pub fn drop_table(schema: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", qualified_table(schema, table))
}
