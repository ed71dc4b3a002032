//! Spec document persistence. Documents live at `{dir}/{formName}_spec.json`.

use crate::error::SpecError;
use crate::ident::invalid_schema_identifier;
use crate::mapper::map_schema;
use crate::spec::FormSpec;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

const FLAG_KEY: &str = "provisioned";
const LEGACY_FLAG_KEY: &str = "dbTableCreated";

/// Source of form specs and owner of the persisted `provisioned` flag.
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Spec for `form_name`, or None when no document exists.
    async fn load(&self, form_name: &str) -> Result<Option<FormSpec>, SpecError>;

    /// Persist the `provisioned` flag. A missing document is not an error.
    async fn set_provisioned(&self, form_name: &str, provisioned: bool) -> Result<(), SpecError>;
}

/// Spec documents stored as JSON files in one directory.
#[derive(Clone, Debug)]
pub struct FileSpecStore {
    dir: PathBuf,
}

impl FileSpecStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSpecStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn spec_path(&self, form_name: &str) -> PathBuf {
        spec_path(&self.dir, form_name)
    }

    async fn read_document(&self, form_name: &str) -> Result<Option<String>, SpecError> {
        match tokio::fs::read_to_string(self.spec_path(form_name)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Deterministic document path for a form.
pub fn spec_path(dir: &Path, form_name: &str) -> PathBuf {
    dir.join(format!("{}_spec.json", form_name))
}

/// True for file names that hold specs rather than submissions.
pub fn is_spec_file_name(name: &str) -> bool {
    name.ends_with("_spec.json")
}

fn parse_spec(form_name: &str, raw: &str) -> Result<FormSpec, SpecError> {
    let mut spec: FormSpec = serde_json::from_str(raw).map_err(|source| SpecError::Parse {
        form: form_name.to_string(),
        source,
    })?;
    if spec.form_name.is_empty() {
        spec.form_name = form_name.to_string();
    }
    if let Some(name) = invalid_schema_identifier(&spec.form_name, &map_schema(&spec)) {
        return Err(SpecError::InvalidIdentifier {
            form: form_name.to_string(),
            name,
        });
    }
    Ok(spec)
}

#[async_trait]
impl SpecStore for FileSpecStore {
    async fn load(&self, form_name: &str) -> Result<Option<FormSpec>, SpecError> {
        let Some(raw) = self.read_document(form_name).await? else {
            return Ok(None);
        };
        parse_spec(form_name, &raw).map(Some)
    }

    async fn set_provisioned(&self, form_name: &str, provisioned: bool) -> Result<(), SpecError> {
        let Some(raw) = self.read_document(form_name).await? else {
            tracing::debug!(form = %form_name, "no spec document; provisioned flag not persisted");
            return Ok(());
        };
        // Rewrite the raw document so keys this crate does not model survive.
        let mut doc: Value = serde_json::from_str(&raw).map_err(|source| SpecError::Parse {
            form: form_name.to_string(),
            source,
        })?;
        if let Some(obj) = doc.as_object_mut() {
            // Both keys present would be a duplicate field on the next load.
            let key = if obj.contains_key(LEGACY_FLAG_KEY) { LEGACY_FLAG_KEY } else { FLAG_KEY };
            obj.insert(key.into(), Value::Bool(provisioned));
        }
        let pretty = serde_json::to_string_pretty(&doc).map_err(|source| SpecError::Parse {
            form: form_name.to_string(),
            source,
        })?;
        let path = self.spec_path(form_name);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, pretty).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-process spec store, for embedding and tests.
#[derive(Default)]
pub struct MemorySpecStore {
    specs: RwLock<HashMap<String, FormSpec>>,
}

impl MemorySpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, spec: FormSpec) {
        let mut guard = self.specs.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(spec.form_name.clone(), spec);
    }

    pub fn get(&self, form_name: &str) -> Option<FormSpec> {
        let guard = self.specs.read().unwrap_or_else(|e| e.into_inner());
        guard.get(form_name).cloned()
    }
}

#[async_trait]
impl SpecStore for MemorySpecStore {
    async fn load(&self, form_name: &str) -> Result<Option<FormSpec>, SpecError> {
        Ok(self.get(form_name))
    }

    async fn set_provisioned(&self, form_name: &str, provisioned: bool) -> Result<(), SpecError> {
        let mut guard = self.specs.write().unwrap_or_else(|e| e.into_inner());
        if let Some(spec) = guard.get_mut(form_name) {
            spec.provisioned = provisioned;
        }
        Ok(())
    }
}
