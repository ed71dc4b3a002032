//! Record handlers: stored rows per form, single records, teardown, registered forms.

use crate::engine::TeardownReport;
use crate::error::SyncError;
use crate::ident::{check_form_name, check_session_id};
use crate::response::{ok, record_list, OkBody, RecordList};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

pub async fn list(
    State(state): State<AppState>,
    Path(form_name): Path<String>,
) -> Result<Json<OkBody<RecordList>>, SyncError> {
    check_form_name(&form_name)?;
    let records = state.engine.list_records(&form_name).await?;
    Ok(record_list(records))
}

#[derive(Serialize)]
pub struct RecordBody {
    pub record: Value,
}

pub async fn read(
    State(state): State<AppState>,
    Path((form_name, session_id)): Path<(String, String)>,
) -> Result<Json<OkBody<RecordBody>>, SyncError> {
    check_form_name(&form_name)?;
    check_session_id(&session_id)?;
    let record = state
        .engine
        .get_record(&form_name, &session_id)
        .await?
        .ok_or_else(|| SyncError::NotFound(format!("{}/{}", form_name, session_id)))?;
    Ok(ok(RecordBody { record }))
}

pub async fn drop_form(
    State(state): State<AppState>,
    Path(form_name): Path<String>,
) -> Result<Json<OkBody<TeardownReport>>, SyncError> {
    check_form_name(&form_name)?;
    Ok(ok(state.engine.drop_form(&form_name).await))
}

#[derive(Serialize)]
pub struct FormsBody {
    pub forms: Vec<String>,
}

pub async fn forms(State(state): State<AppState>) -> Result<Json<OkBody<FormsBody>>, SyncError> {
    let forms = state.engine.registered_forms().await?;
    Ok(ok(FormsBody { forms }))
}
