//! Runtime settings read from the environment.

use crate::error::SyncError;
use crate::ident::is_valid_identifier;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// PostgreSQL URL. None disables the store; submissions are still archived.
    pub database_url: Option<String>,
    /// Directory holding spec documents and archived submissions.
    pub data_dir: PathBuf,
    /// PostgreSQL schema for form tables and the registry.
    pub schema: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub bind: SocketAddr,
    /// Maximum accepted request body in bytes.
    pub body_limit: usize,
    /// Origins allowed by CORS; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            data_dir: PathBuf::from("_data"),
            schema: "public".into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            bind: SocketAddr::from(([0, 0, 0, 0], 3001)),
            body_limit: 1024 * 1024,
            cors_origins: vec!["*".into()],
        }
    }
}

impl SyncConfig {
    /// Read `DATABASE_URL` and the `FORMSYNC_*` variables; unset variables keep their defaults.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SyncError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        config.database_url = get("DATABASE_URL");
        if let Some(dir) = get("FORMSYNC_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(schema) = get("FORMSYNC_SCHEMA") {
            if !is_valid_identifier(&schema) {
                return Err(SyncError::Configuration(format!("FORMSYNC_SCHEMA: invalid schema name '{}'", schema)));
            }
            config.schema = schema;
        }
        if let Some(v) = get("FORMSYNC_MAX_CONNECTIONS") {
            config.max_connections = parse("FORMSYNC_MAX_CONNECTIONS", &v)?;
            if config.max_connections == 0 {
                return Err(SyncError::Configuration("FORMSYNC_MAX_CONNECTIONS must be at least 1".into()));
            }
        }
        if let Some(v) = get("FORMSYNC_BIND") {
            config.bind = parse("FORMSYNC_BIND", &v)?;
        }
        if let Some(v) = get("FORMSYNC_BODY_LIMIT") {
            config.body_limit = parse("FORMSYNC_BODY_LIMIT", &v)?;
        }
        if let Some(v) = get("FORMSYNC_CORS_ORIGINS") {
            config.cors_origins = parse_origins(&v)?;
        }
        Ok(config)
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SyncError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| SyncError::Configuration(format!("{}: {}", key, e)))
}

/// Comma-separated origins, each `*` or a valid header value.
fn parse_origins(value: &str) -> Result<Vec<String>, SyncError> {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        return Err(SyncError::Configuration("FORMSYNC_CORS_ORIGINS lists no origins".into()));
    }
    if let Some(bad) = origins.iter().find(|o| HeaderValue::from_str(o).is_err()) {
        return Err(SyncError::Configuration(format!("FORMSYNC_CORS_ORIGINS: invalid origin '{}'", bad)));
    }
    Ok(origins)
}
