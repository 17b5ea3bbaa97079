//! Error types for CLI operations.

use contracts::FusionError;
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Fusion core error (config, calibration, estimator, publisher IO)
    #[error(transparent)]
    Fusion(#[from] FusionError),

    /// Sample source failed
    #[error("Ingestion failed: {0}")]
    Ingestion(#[from] IngestionError),

    /// Sample source task panicked or was cancelled
    #[error("Ingestion task aborted: {0}")]
    IngestionTask(#[from] tokio::task::JoinError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
