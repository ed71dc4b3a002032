//! Submission payloads as posted by rendered forms: `{formName, sessionId, data}` where
//! `data` carries a reserved `_meta` object next to the field values.

use crate::error::SyncError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Reserved key inside `data`.
pub const META_KEY: &str = "_meta";

/// Form name used when neither the request nor `_meta` names one.
pub const DEFAULT_FORM_NAME: &str = "form";

/// Body of a save request.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub form_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMeta {
    #[serde(default)]
    pub form_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

impl SubmissionMeta {
    /// `_meta` of a data object; missing or malformed meta reads as empty.
    pub fn of(data: &Map<String, Value>) -> Self {
        data.get(META_KEY)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

/// One submission ready to synchronize.
#[derive(Clone, Debug)]
pub struct Submission {
    pub form_name: String,
    pub session_id: String,
    pub submitted_at: DateTime<Utc>,
    /// Field values keyed by field name, `_meta` removed.
    pub values: Map<String, Value>,
}

impl Submission {
    pub fn new(form_name: impl Into<String>, session_id: impl Into<String>, values: Map<String, Value>) -> Self {
        let mut values = values;
        values.remove(META_KEY);
        Submission {
            form_name: form_name.into(),
            session_id: session_id.into(),
            submitted_at: Utc::now(),
            values,
        }
    }

    pub fn with_submitted_at(mut self, at: DateTime<Utc>) -> Self {
        self.submitted_at = at;
        self
    }

    /// Build from a save payload. Explicit names win over `_meta`; a missing session id
    /// is generated; a missing `submittedAt` means now.
    pub fn from_payload(
        form_name: Option<&str>,
        session_id: Option<&str>,
        data: Value,
    ) -> Result<Self, SyncError> {
        let Value::Object(values) = data else {
            return Err(SyncError::BadRequest("data must be a JSON object".into()));
        };
        let meta = SubmissionMeta::of(&values);

        let form_name = non_empty(form_name)
            .or(non_empty(meta.form_name.as_deref()))
            .unwrap_or(DEFAULT_FORM_NAME)
            .to_string();
        let session_id = non_empty(session_id)
            .or(non_empty(meta.session_id.as_deref()))
            .map(str::to_string)
            .unwrap_or_else(generate_session_id);
        let submitted_at = match non_empty(meta.submitted_at.as_deref()) {
            Some(s) => parse_timestamp(s)?,
            None => Utc::now(),
        };

        Ok(Submission::new(form_name, session_id, values).with_submitted_at(submitted_at))
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// `submitted_at` as bound into SQL.
    pub fn submitted_at_rfc3339(&self) -> String {
        self.submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, SyncError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|_| SyncError::BadRequest(format!("submittedAt must be RFC 3339, got {:?}", s)))
}

/// Short random session id (first 8 hex chars of a v4 UUID).
pub fn generate_session_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
