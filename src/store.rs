//! Schema registry DDL and database bootstrap. The registry table lives in the same
//! PostgreSQL schema as the form tables (`FORMSYNC_SCHEMA`, default `public`).

use crate::error::{SpecError, SyncError};
use crate::mapper::FormSchema;
use crate::sql::{qualified_table, quoted};
use serde_json::Value;
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions;
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;

/// One row per provisioned form.
pub const REGISTRY_TABLE: &str = "_formsync_registry";

/// Create the form schema if missing, then the registry table. Concurrent callers
/// serialize on an advisory lock; IF NOT EXISTS alone can still collide in the catalog.
pub async fn ensure_registry_table(pool: &PgPool, schema: &str) -> Result<(), SyncError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(format!("formsync:{}", schema))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
        .execute(&mut *tx)
        .await?;
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            form_name TEXT PRIMARY KEY,
            layout JSONB NOT NULL,
            provisioned_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        qualified_table(schema, REGISTRY_TABLE)
    );
    sqlx::query(&ddl).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

/// Whether the form has a registry record. Call inside the provisioning transaction.
pub async fn registry_contains(
    conn: &mut PgConnection,
    schema: &str,
    form_name: &str,
) -> Result<bool, SyncError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE form_name = $1)",
        qualified_table(schema, REGISTRY_TABLE)
    );
    let exists: (bool,) = sqlx::query_as(&sql)
        .bind(form_name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists.0)
}

/// Record the form and the layout its tables were created with. Existing records are kept.
pub async fn register_form(
    conn: &mut PgConnection,
    schema: &str,
    form_name: &str,
    layout: &Value,
) -> Result<(), SyncError> {
    let sql = format!(
        "INSERT INTO {} (form_name, layout, provisioned_at) VALUES ($1, $2, NOW()) ON CONFLICT (form_name) DO NOTHING",
        qualified_table(schema, REGISTRY_TABLE)
    );
    sqlx::query(&sql)
        .bind(form_name)
        .bind(layout)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Remove the form's registry record. Returns whether a record existed.
pub async fn unregister_form(pool: &PgPool, schema: &str, form_name: &str) -> Result<bool, SyncError> {
    let sql = format!(
        "DELETE FROM {} WHERE form_name = $1",
        qualified_table(schema, REGISTRY_TABLE)
    );
    let result = sqlx::query(&sql).bind(form_name).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// Layout the form's tables were created with, or None when the form is not registered.
pub async fn registered_layout(pool: &PgPool, schema: &str, form_name: &str) -> Result<Option<FormSchema>, SyncError> {
    let sql = format!(
        "SELECT layout FROM {} WHERE form_name = $1",
        qualified_table(schema, REGISTRY_TABLE)
    );
    tracing::debug!(sql = %sql, "query");
    let layout: Option<Value> = sqlx::query_scalar(&sql).bind(form_name).fetch_optional(pool).await?;
    layout
        .map(serde_json::from_value)
        .transpose()
        .map_err(|source| {
            SyncError::from(SpecError::Parse {
                form: form_name.to_string(),
                source,
            })
        })
}

/// Names of all provisioned forms.
pub async fn registered_forms(pool: &PgPool, schema: &str) -> Result<Vec<String>, SyncError> {
    let sql = format!(
        "SELECT form_name FROM {} ORDER BY form_name",
        qualified_table(schema, REGISTRY_TABLE)
    );
    tracing::debug!(sql = %sql, "query");
    let rows = sqlx::query_scalar::<_, String>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), SyncError> {
    let (admin, db_name) = admin_options(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let mut conn: PgConnection = admin.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// Options for the `postgres` maintenance database plus the target database name.
/// Without a database in the URL the target is the user's database, as with libpq.
fn admin_options(database_url: &str) -> Result<(PgConnectOptions, String), SyncError> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| SyncError::Configuration(format!("invalid DATABASE_URL: {}", e)))?;
    let db_name = opts
        .get_database()
        .unwrap_or_else(|| opts.get_username())
        .to_string();
    Ok((opts.database("postgres"), db_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_options_target_postgres_database() {
        let (admin, name) = admin_options("postgres://u:p@localhost:5432/forms").unwrap();
        assert_eq!(admin.get_database(), Some("postgres"));
        assert_eq!(admin.get_host(), "localhost");
        assert_eq!(admin.get_port(), 5432);
        assert_eq!(name, "forms");

        let (admin, name) = admin_options("postgres://localhost/forms?sslmode=disable").unwrap();
        assert_eq!(admin.get_database(), Some("postgres"));
        assert_eq!(name, "forms");

        assert!(admin_options("nonsense").is_err());
    }

    #[test]
    fn query_values_do_not_leak_into_database_name() {
        let (admin, name) =
            admin_options("postgres://u@localhost:5432/forms?sslrootcert=/etc/ssl/ca.pem").unwrap();
        assert_eq!(name, "forms");
        assert_eq!(admin.get_database(), Some("postgres"));
        assert_eq!(admin.get_host(), "localhost");
    }

    #[test]
    fn missing_database_defaults_to_user() {
        if std::env::var("PGDATABASE").is_ok() {
            return;
        }
        let (admin, name) = admin_options("postgres://u@localhost:5432").unwrap();
        assert_eq!(name, "u");
        assert_eq!(admin.get_host(), "localhost");
        assert_eq!(admin.get_database(), Some("postgres"));
    }
}
