use billbook_core::{StoreError, WindowError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("repository is closed")]
    Closed,
    #[error("worker pool error: {0}")]
    Pool(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid calendar anchor: {0}")]
    Anchor(#[from] WindowError),
    #[error("pool.workers must be at least 1")]
    NoWorkers,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transaction {0} not found")]
    NotFound(billbook_core::TransactionId),
    #[error("{0} did not take effect")]
    Rejected(&'static str),
    #[error("request was cancelled")]
    Discarded,
}
