//! Shared application state for all routes.

use crate::archive::SubmissionArchive;
use crate::engine::FormSync;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: FormSync,
    pub archive: Arc<SubmissionArchive>,
}

impl AppState {
    pub fn new(engine: FormSync, archive: SubmissionArchive) -> Self {
        AppState {
            engine,
            archive: Arc::new(archive),
        }
    }
}
