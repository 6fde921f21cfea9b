use crate::plugin::IndexError;
use stratum_api::{ApiError, GenerationId, SymbolHandle};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StratumError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("Not found: {what}")]
    NotFound {
        what: String,
        path: Option<PathBuf>,
    },
    #[error("Stale handle {handle}: current generation is {current}")]
    Stale {
        handle: SymbolHandle,
        current: GenerationId,
    },
    #[error("Unsupported path {}: {reason}", .path.display())]
    Unsupported { path: PathBuf, reason: String },
    /// Another writer published first. Retried by the publish loop, never surfaced.
    #[error("Generation {expected} was superseded by {actual} before publish")]
    Transient {
        expected: GenerationId,
        actual: GenerationId,
    },
    #[error("Fatal error: {0}")]
    Fatal(String),
    #[error("Operation cancelled")]
    Cancelled,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StratumError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StratumError::NotFound {
            what: what.into(),
            path: None,
        }
    }

    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StratumError::Unsupported {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for StratumError {
    fn from(err: tokio::task::JoinError) -> Self {
        StratumError::Internal(err.to_string())
    }
}

impl From<StratumError> for ApiError {
    fn from(err: StratumError) -> Self {
        match err {
            StratumError::NotFound { what, path } => ApiError::NotFound { what, path },
            StratumError::Stale { handle, current } => ApiError::Stale { handle, current },
            StratumError::Unsupported { path, reason } => ApiError::Unsupported { path, reason },
            StratumError::Fatal(msg) => ApiError::Fatal(msg),
            StratumError::Cancelled => ApiError::Cancelled,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StratumError>;
