//! Error types for the mlreg-core crate.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for publishing operations.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Model directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Registry error (HTTP {status}) {error_code}: {message}")]
    Service {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Experiment '{name}' exists but is deleted")]
    ExperimentDeleted { name: String },

    #[error("Unsupported artifact URI: {uri}")]
    UnsupportedArtifactUri { uri: String },

    #[error("Unexpected registry response: {0}")]
    Protocol(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl PublishError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Whether this is a registry-side error carrying the given MLflow error code.
    pub fn has_error_code(&self, code: &str) -> bool {
        matches!(self, Self::Service { error_code, .. } if error_code == code)
    }
}
