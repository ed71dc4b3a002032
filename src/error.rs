//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// SQLSTATE raised by PostgreSQL when a referenced relation does not exist.
const UNDEFINED_TABLE: &str = "42P01";
const UNDEFINED_COLUMN: &str = "42703";

#[derive(Error, Debug)]
pub enum SpecError {
    #[error("spec document for '{form}' is not valid JSON: {source}")]
    Parse {
        form: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("spec '{form}' has an invalid identifier: {name}")]
    InvalidIdentifier { form: String, name: String },
    #[error("spec io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("spec not found: {0}")]
    SpecNotFound(String),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("archive io: {0}")]
    Io(#[from] std::io::Error),
}

fn has_sqlstate(err: &sqlx::Error, code: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(code),
        _ => false,
    }
}

/// True when the error is PostgreSQL reporting a missing table.
pub fn is_undefined_table(err: &sqlx::Error) -> bool {
    has_sqlstate(err, UNDEFINED_TABLE)
}

/// True when a statement names a column the table does not have.
pub fn is_undefined_column(err: &sqlx::Error) -> bool {
    has_sqlstate(err, UNDEFINED_COLUMN)
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl SyncError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            SyncError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            SyncError::SpecNotFound(_) => (StatusCode::NOT_FOUND, "spec_not_found"),
            SyncError::Spec(_) => (StatusCode::UNPROCESSABLE_ENTITY, "spec_error"),
            SyncError::StorageUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
            SyncError::SchemaMismatch(_) => (StatusCode::UNPROCESSABLE_ENTITY, "schema_mismatch"),
            SyncError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SyncError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            SyncError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
