//! formsync: provision relational tables from form specs and keep submissions in sync with them.

pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ident;
pub mod mapper;
pub mod payload;
pub mod provision;
pub mod response;
pub mod routes;
pub mod seed;
pub mod service;
pub mod spec;
pub mod sql;
pub mod state;
pub mod store;

pub use archive::SubmissionArchive;
pub use config::SyncConfig;
pub use engine::{FormSync, SyncOutcome, TeardownReport};
pub use error::{SpecError, SyncError};
pub use mapper::{map_schema, ChildTable, FormSchema};
pub use payload::{SaveRequest, Submission};
pub use provision::SchemaProvisioner;
pub use routes::router;
pub use seed::{seed_from_archive, SeedReport, SeedStatus};
pub use service::{RecordReader, RecordSynchronizer, SyncSummary, TableOutcome, TeardownManager};
pub use spec::{FileSpecStore, FormSpec, MemorySpecStore, SpecStore};
pub use state::AppState;
pub use store::{ensure_database_exists, ensure_registry_table};
