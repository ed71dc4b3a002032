//! formsync-server: archive form submissions and sync them into PostgreSQL.
//!
//! Run from repo root: `cargo run -p formsync-server`

use formsync::{router, AppState, FileSpecStore, FormSync, SubmissionArchive, SyncConfig};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("formsync=info,formsync_server=info")),
        )
        .init();

    let config = SyncConfig::from_env()?;
    let specs = Arc::new(FileSpecStore::new(&config.data_dir));
    let engine = FormSync::connect(&config, specs).await?;
    let state = AppState::new(engine, SubmissionArchive::new(&config.data_dir));

    let app = router(state, &config);
    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        data_dir = %config.data_dir.display(),
        "formsync listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
