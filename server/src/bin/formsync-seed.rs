//! formsync-seed: replay archived submissions from the data directory into PostgreSQL.
//! Exits non-zero when any file failed to sync.

use formsync::{seed_from_archive, FileSpecStore, FormSync, SubmissionArchive, SyncConfig};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("formsync=info")),
        )
        .init();

    let config = SyncConfig::from_env()?;
    if config.database_url.is_none() {
        return Err("DATABASE_URL must be set to seed".into());
    }
    let specs = Arc::new(FileSpecStore::new(&config.data_dir));
    let engine = FormSync::connect(&config, specs).await?;
    let report = seed_from_archive(&engine, &SubmissionArchive::new(&config.data_dir)).await?;

    if let Some(pool) = engine.pool() {
        pool.close().await;
    }
    Ok(if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
