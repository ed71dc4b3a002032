//! Submission archive: each saved payload as pretty JSON at `{dir}/{formName}_{sessionId}.json`.

use crate::error::SyncError;
use crate::spec::is_spec_file_name;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct SubmissionArchive {
    dir: PathBuf,
}

impl SubmissionArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SubmissionArchive { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(form_name: &str, session_id: &str) -> String {
        format!("{}_{}.json", form_name, session_id)
    }

    pub fn path(&self, form_name: &str, session_id: &str) -> PathBuf {
        self.dir.join(Self::file_name(form_name, session_id))
    }

    /// Write the payload, replacing any earlier save of the same session. Returns the file name.
    pub async fn write(&self, form_name: &str, session_id: &str, data: &Value) -> Result<String, SyncError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = Self::file_name(form_name, session_id);
        let pretty = serde_json::to_string_pretty(data)
            .map_err(|e| SyncError::BadRequest(format!("data is not serializable: {}", e)))?;
        tokio::fs::write(self.dir.join(&file_name), pretty).await?;
        tracing::debug!(file = %file_name, "submission archived");
        Ok(file_name)
    }

    /// Archived payload, or None when the file does not exist.
    pub async fn read(&self, form_name: &str, session_id: &str) -> Result<Option<Value>, SyncError> {
        read_json(&self.path(form_name, session_id)).await
    }

    /// Archived submission files (spec documents excluded), sorted by name.
    /// A missing directory has no entries.
    pub async fn entries(&self) -> Result<Vec<PathBuf>, SyncError> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(".json") && !is_spec_file_name(name) && entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

pub(crate) async fn read_json(path: &Path) -> Result<Option<Value>, SyncError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| SyncError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
