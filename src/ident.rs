//! Identifier rules for names that end up in DDL/DML and file names.
//! Enforced where names enter the crate (request layer, spec store); the SQL builder trusts its input.

use crate::error::SyncError;
use crate::mapper::{child_table_name, FormSchema};
use regex::Regex;
use std::sync::OnceLock;

/// PostgreSQL truncates longer identifiers.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Prefix reserved for this crate's own tables.
pub const RESERVED_PREFIX: &str = "_formsync";

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn session_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,128}$").expect("static regex"))
}

pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && identifier_re().is_match(name)
}

pub fn is_valid_session_id(id: &str) -> bool {
    session_id_re().is_match(id)
}

pub fn check_form_name(name: &str) -> Result<(), SyncError> {
    if !is_valid_identifier(name) || name.starts_with(RESERVED_PREFIX) {
        return Err(SyncError::BadRequest(format!("invalid form name: {:?}", name)));
    }
    Ok(())
}

pub fn check_session_id(id: &str) -> Result<(), SyncError> {
    if !is_valid_session_id(id) {
        return Err(SyncError::BadRequest(format!("invalid session id: {:?}", id)));
    }
    Ok(())
}

/// First name in the derived schema that cannot be used as an identifier, including
/// child table names that would exceed the length limit once prefixed with the form name.
pub fn invalid_schema_identifier(form_name: &str, schema: &FormSchema) -> Option<String> {
    if !is_valid_identifier(form_name) || form_name.starts_with(RESERVED_PREFIX) {
        return Some(form_name.to_string());
    }
    if let Some(col) = schema.main_columns.iter().find(|c| !is_valid_identifier(c)) {
        return Some(col.clone());
    }
    for child in &schema.child_tables {
        if !is_valid_identifier(&child.field_name)
            || !is_valid_identifier(&child_table_name(form_name, &child.field_name))
        {
            return Some(child.field_name.clone());
        }
        if let Some(col) = child.columns.iter().find(|c| !is_valid_identifier(c)) {
            return Some(col.clone());
        }
    }
    None
}
