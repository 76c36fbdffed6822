//! Engine error taxonomy.
//!
//! Structural failures (headerless CSV, unreachable service) are fatal for the
//! call that hits them. Malformed individual values never surface here; they
//! are skipped or defaulted by the components that read them.

use crate::models::DatasetId;

/// Result alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by ingestion, partitioning, storage and the ML service client.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed or headerless CSV input.
    Format(String),
    /// A date range whose start lies after its end.
    InvalidRange(String),
    /// Unknown dataset identifier.
    NotFound(DatasetId),
    /// The external training/prediction service failed or was unreachable.
    Service(String),
    /// Upload rejected before any parsing happened.
    InvalidUpload(String),
    /// A workflow step was attempted before its inputs exist.
    Precondition(String),
    /// Optimistic version check failed on save.
    Conflict {
        id: DatasetId,
        expected: u64,
        found: u64,
    },
    Io(std::io::Error),
    Storage(rusqlite::Error),
    Serialization(serde_json::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Format(msg) => write!(f, "CSV format error: {}", msg),
            Self::InvalidRange(msg) => write!(f, "Invalid date ranges - {}", msg),
            Self::NotFound(id) => write!(f, "Dataset not found: {}", id),
            Self::Service(msg) => write!(f, "{}", msg),
            Self::InvalidUpload(msg) => write!(f, "{}", msg),
            Self::Precondition(msg) => write!(f, "{}", msg),
            Self::Conflict {
                id,
                expected,
                found,
            } => write!(
                f,
                "Dataset {} was modified concurrently (expected version {}, found {})",
                id, expected, found
            ),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Storage(e) => write!(f, "SQLite error: {}", e),
            Self::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Storage(e) => Some(e),
            Self::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}

impl From<csv::Error> for EngineError {
    fn from(e: csv::Error) -> Self {
        let msg = e.to_string();
        match e.into_kind() {
            csv::ErrorKind::Io(io) => Self::Io(io),
            _ => Self::Format(msg),
        }
    }
}

impl EngineError {
    /// True for errors that describe bad caller input rather than a system fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Format(_)
                | Self::InvalidRange(_)
                | Self::NotFound(_)
                | Self::InvalidUpload(_)
                | Self::Precondition(_)
        )
    }
}
