//! Apply a form's derived layout to the database: main table, child tables, child indexes.
//! Create-if-not-exists only; existing tables are never altered or dropped.

use crate::error::SyncError;
use crate::mapper::FormSchema;
use crate::sql::form_ddl;
use crate::store::{register_form, registry_contains};
use sqlx::PgPool;

pub struct SchemaProvisioner;

impl SchemaProvisioner {
    /// Ensure the form's tables exist. Runs in one transaction holding an advisory lock
    /// keyed by the form, so concurrent first submissions issue DDL once and never see a
    /// half-created table set. Returns true when DDL was issued, false on a registry hit.
    pub async fn provision(
        pool: &PgPool,
        schema: &str,
        form_name: &str,
        layout: &FormSchema,
    ) -> Result<bool, SyncError> {
        let mut tx = pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("formsync:{}.{}", schema, form_name))
            .execute(&mut *tx)
            .await?;

        if registry_contains(&mut tx, schema, form_name).await? {
            tx.commit().await?;
            tracing::debug!(form = %form_name, "form already registered; skipping DDL");
            return Ok(false);
        }

        for sql in form_ddl(schema, form_name, layout) {
            tracing::debug!(sql = %sql, "ddl");
            sqlx::query(&sql).execute(&mut *tx).await?;
        }
        let snapshot = serde_json::json!(layout);
        register_form(&mut tx, schema, form_name, &snapshot).await?;
        tx.commit().await?;

        tracing::info!(
            form = %form_name,
            columns = layout.main_columns.len(),
            child_tables = layout.child_tables.len(),
            "provisioned form tables"
        );
        Ok(true)
    }
}
