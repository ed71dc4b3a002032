//! Submission handlers: save (archive, then synchronize) and load from the archive.

use crate::engine::SyncOutcome;
use crate::error::SyncError;
use crate::ident::{check_form_name, check_session_id};
use crate::payload::{SaveRequest, Submission};
use crate::response::{ok, OkBody};
use crate::service::SyncSummary;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub file: String,
    pub form_name: String,
    pub session_id: String,
    /// False when the store is disabled or the form has no spec; the archive still holds the data.
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SyncSummary>,
}

pub async fn save(
    State(state): State<AppState>,
    Json(req): Json<SaveRequest>,
) -> Result<Json<OkBody<SaveResponse>>, SyncError> {
    let data = req
        .data
        .ok_or_else(|| SyncError::BadRequest("no data provided".into()))?;
    let submission = Submission::from_payload(req.form_name.as_deref(), req.session_id.as_deref(), data.clone())?;
    check_form_name(&submission.form_name)?;
    check_session_id(&submission.session_id)?;

    let file = state
        .archive
        .write(&submission.form_name, &submission.session_id, &data)
        .await?;

    let summary = match state.engine.synchronize(&submission).await {
        Ok(SyncOutcome::Synced(summary)) => Some(summary),
        Ok(SyncOutcome::StoreDisabled) => None,
        Err(SyncError::SpecNotFound(form)) => {
            tracing::debug!(form = %form, "no spec; submission archived only");
            None
        }
        Err(e) => return Err(e),
    };

    Ok(ok(SaveResponse {
        file,
        form_name: submission.form_name,
        session_id: submission.session_id,
        synced: summary.is_some(),
        summary,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadQuery {
    pub form_name: Option<String>,
    pub id: Option<String>,
}

#[derive(Serialize)]
pub struct LoadResponse {
    pub data: Value,
}

pub async fn load(
    State(state): State<AppState>,
    Query(q): Query<LoadQuery>,
) -> Result<Json<OkBody<LoadResponse>>, SyncError> {
    let (Some(form_name), Some(id)) = (q.form_name, q.id) else {
        return Err(SyncError::BadRequest("formName and id required".into()));
    };
    check_form_name(&form_name)?;
    check_session_id(&id)?;
    let data = state
        .archive
        .read(&form_name, &id)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("{}/{}", form_name, id)))?;
    Ok(ok(LoadResponse { data }))
}
