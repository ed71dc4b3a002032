//! Submission and record routes under /api.

use crate::handlers::{records, submission};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};

pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/save", post(submission::save))
        .route("/api/load", get(submission::load))
        .route("/api/db/records/:form_name", get(records::list))
        .route("/api/db/record/:form_name/:session_id", get(records::read))
        .route("/api/db/forms", get(records::forms))
        .route("/api/db/forms/:form_name", delete(records::drop_form))
        .with_state(state)
}
