//! Errors at the core's few fallible boundaries.
//!
//! Numeric paths never fail: malformed samples are skipped and degenerate
//! traces degrade to empty or pass-through results.

use thiserror::Error;
use tripsync_env::EnvError;

#[derive(Debug, Error)]
pub enum TripError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid trip document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Env(#[from] EnvError),
}

impl TripError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }
}

impl From<serde_json::Error> for TripError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidDocument(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TripError>;
