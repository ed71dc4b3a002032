//! Engine facade: resolves specs, provisions on demand and dispatches to the storage
//! services. Cheap to clone; shared by request handlers and the seed tool.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::mapper::{map_schema, FormSchema};
use crate::payload::Submission;
use crate::provision::SchemaProvisioner;
use crate::service::{RecordReader, RecordSynchronizer, SyncSummary, TableOutcome, TeardownManager};
use crate::spec::{FormSpec, SpecStore};
use crate::store::{
    ensure_database_exists, ensure_registry_table, registered_forms, registered_layout, unregister_form,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct FormSync {
    pool: Option<PgPool>,
    specs: Arc<dyn SpecStore>,
    schema: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced(SyncSummary),
    /// No database configured; nothing was written.
    StoreDisabled,
}

impl SyncOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownReport {
    pub form_name: String,
    pub tables: Vec<TableOutcome>,
    pub registry_cleared: bool,
    pub spec_reset: bool,
}

impl FormSync {
    /// `pool` None runs without a store: synchronize reports `StoreDisabled`, reads are empty.
    pub fn new(pool: Option<PgPool>, specs: Arc<dyn SpecStore>, schema: impl Into<String>) -> Self {
        FormSync {
            pool,
            specs,
            schema: schema.into(),
        }
    }

    /// Create the database if missing, open the pool and ensure the registry table.
    /// Without `database_url` the engine starts store-less.
    pub async fn connect(config: &SyncConfig, specs: Arc<dyn SpecStore>) -> Result<Self, SyncError> {
        let Some(url) = config.database_url.as_deref() else {
            tracing::warn!("DATABASE_URL not set; submissions will not be synchronized");
            return Ok(Self::new(None, specs, config.schema.clone()));
        };
        ensure_database_exists(url).await?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(url)
            .await?;
        ensure_registry_table(&pool, &config.schema).await?;
        Ok(Self::new(Some(pool), specs, config.schema.clone()))
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn specs(&self) -> &Arc<dyn SpecStore> {
        &self.specs
    }

    /// Spec for `form_name`; SpecNotFound when there is none.
    pub async fn spec(&self, form_name: &str) -> Result<FormSpec, SyncError> {
        self.specs
            .load(form_name)
            .await?
            .ok_or_else(|| SyncError::SpecNotFound(form_name.to_string()))
    }

    /// Provision the form's tables if needed, then write the submission.
    pub async fn synchronize(&self, submission: &Submission) -> Result<SyncOutcome, SyncError> {
        let form_name = submission.form_name.as_str();
        let spec = self.spec(form_name).await?;
        let layout = map_schema(&spec);
        let Some(pool) = &self.pool else {
            tracing::debug!(form = %form_name, "store disabled; submission not synchronized");
            return Ok(SyncOutcome::StoreDisabled);
        };

        if !spec.provisioned {
            self.provision(pool, form_name, &layout).await?;
        }

        let summary = match RecordSynchronizer::synchronize(pool, &self.schema, &layout, submission).await {
            // The flag can outlive the tables; provision and retry once if anything was missing.
            Err(SyncError::SchemaMismatch(reason)) if spec.provisioned => {
                if !self.provision(pool, form_name, &layout).await? {
                    return Err(SyncError::SchemaMismatch(reason));
                }
                tracing::info!(form = %form_name, "stale provisioned flag; tables recreated");
                RecordSynchronizer::synchronize(pool, &self.schema, &layout, submission).await?
            }
            result => result?,
        };
        tracing::info!(
            form = %form_name,
            session = %submission.session_id,
            columns = summary.columns_written,
            "submission synchronized"
        );
        Ok(SyncOutcome::Synced(summary))
    }

    /// Create the form's tables if unregistered and mark the spec provisioned.
    /// True when DDL was issued.
    async fn provision(&self, pool: &PgPool, form_name: &str, layout: &FormSchema) -> Result<bool, SyncError> {
        let created = SchemaProvisioner::provision(pool, &self.schema, form_name, layout).await?;
        if let Err(e) = self.specs.set_provisioned(form_name, true).await {
            tracing::warn!(form = %form_name, error = %e, "could not persist provisioned flag");
        }
        Ok(created)
    }

    pub async fn list_records(&self, form_name: &str) -> Result<Vec<Value>, SyncError> {
        let Some(pool) = &self.pool else {
            return Ok(Vec::new());
        };
        RecordReader::list_records(pool, &self.schema, form_name).await
    }

    /// Main row with child rows. Without a spec only the main row is returned.
    pub async fn get_record(&self, form_name: &str, session_id: &str) -> Result<Option<Value>, SyncError> {
        let Some(pool) = &self.pool else {
            return Ok(None);
        };
        let layout = match self.specs.load(form_name).await? {
            Some(spec) => map_schema(&spec),
            None => FormSchema::default(),
        };
        RecordReader::get_record(pool, &self.schema, form_name, &layout, session_id).await
    }

    pub async fn registered_forms(&self) -> Result<Vec<String>, SyncError> {
        let Some(pool) = &self.pool else {
            return Ok(Vec::new());
        };
        registered_forms(pool, &self.schema).await
    }

    /// Drop the form's tables, clear its registry record and reset the spec flag.
    /// Never fails; every step's result is in the report.
    pub async fn drop_form(&self, form_name: &str) -> TeardownReport {
        let mut report = TeardownReport {
            form_name: form_name.to_string(),
            ..Default::default()
        };
        let current = match self.specs.load(form_name).await {
            Ok(spec) => spec.map(|s| map_schema(&s)),
            Err(e) => {
                tracing::warn!(form = %form_name, error = %e, "spec unreadable");
                None
            }
        };

        if let Some(pool) = &self.pool {
            // Tables were created from the registered layout; the spec may have changed since.
            let registered = match registered_layout(pool, &self.schema, form_name).await {
                Ok(layout) => layout,
                Err(e) => {
                    tracing::warn!(form = %form_name, error = %e, "registered layout unreadable");
                    None
                }
            };
            let layout = match (registered, current) {
                (Some(registered), Some(current)) => Some(registered.with_children_of(&current)),
                (registered, current) => registered.or(current),
            };
            report.tables = TeardownManager::drop_tables(pool, &self.schema, form_name, layout.as_ref()).await;
            report.registry_cleared = match unregister_form(pool, &self.schema, form_name).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::warn!(form = %form_name, error = %e, "registry record not removed");
                    false
                }
            };
        }

        report.spec_reset = match self.specs.set_provisioned(form_name, false).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(form = %form_name, error = %e, "provisioned flag not reset");
                false
            }
        };
        report
    }
}
