//! Replay archived submissions into the store. Each file is handled on its own;
//! one bad file does not stop the run.

use crate::archive::{read_json, SubmissionArchive};
use crate::engine::{FormSync, SyncOutcome};
use crate::error::SyncError;
use crate::ident::{check_form_name, is_valid_session_id};
use crate::payload::{Submission, SubmissionMeta};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SeedStatus {
    Synced,
    Skipped(String),
    Failed(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct SeedEntry {
    pub file: String,
    #[serde(flatten)]
    pub status: SeedStatus,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SeedReport {
    pub entries: Vec<SeedEntry>,
}

impl SeedReport {
    pub fn count(&self, pred: impl Fn(&SeedStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn synced(&self) -> usize {
        self.count(|s| matches!(s, SeedStatus::Synced))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SeedStatus::Failed(_)))
    }
}

/// Synchronize every archived submission whose `_meta.formName` has a spec.
pub async fn seed_from_archive(engine: &FormSync, archive: &SubmissionArchive) -> Result<SeedReport, SyncError> {
    let files = archive.entries().await?;
    tracing::info!(dir = %archive.dir().display(), files = files.len(), "seeding archived submissions");

    let mut report = SeedReport::default();
    for path in files {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = match seed_file(engine, &path, &file).await {
            Ok(status) => status,
            Err(e) => SeedStatus::Failed(e.to_string()),
        };
        match &status {
            SeedStatus::Synced => tracing::info!(file = %file, "seeded"),
            SeedStatus::Skipped(reason) => tracing::warn!(file = %file, reason = %reason, "seed skipped"),
            SeedStatus::Failed(error) => tracing::warn!(file = %file, error = %error, "seed failed"),
        }
        report.entries.push(SeedEntry { file, status });
    }
    tracing::info!(synced = report.synced(), failed = report.failed(), "seed complete");
    Ok(report)
}

async fn seed_file(engine: &FormSync, path: &Path, file: &str) -> Result<SeedStatus, SyncError> {
    let Some(data) = read_json(path).await? else {
        return Ok(SeedStatus::Skipped("file vanished".into()));
    };
    let Value::Object(values) = data else {
        return Ok(SeedStatus::Skipped("not a JSON object".into()));
    };
    let meta = SubmissionMeta::of(&values);
    let Some(form_name) = meta.form_name.filter(|f| check_form_name(f).is_ok()) else {
        return Ok(SeedStatus::Skipped("no valid _meta.formName".into()));
    };
    let Some(session_id) = meta
        .session_id
        .or_else(|| session_from_file_name(&form_name, file))
        .filter(|s| is_valid_session_id(s))
    else {
        return Ok(SeedStatus::Skipped("no valid session id".into()));
    };
    if engine.specs().load(&form_name).await?.is_none() {
        return Ok(SeedStatus::Skipped(format!("no spec for '{}'", form_name)));
    }

    let submission = Submission::from_payload(Some(&form_name), Some(&session_id), Value::Object(values))?;
    Ok(match engine.synchronize(&submission).await? {
        SyncOutcome::Synced(_) => SeedStatus::Synced,
        SyncOutcome::StoreDisabled => SeedStatus::Skipped("store disabled".into()),
    })
}

/// Session id encoded in an archive file name `{form}_{session}.json`.
pub fn session_from_file_name(form_name: &str, file: &str) -> Option<String> {
    file.strip_suffix(".json")?
        .strip_prefix(form_name)?
        .strip_prefix('_')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
