use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a storage backend for a single operation or a commit.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// Lock timeouts, temporary unavailability; the operation may succeed if resubmitted.
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The destination ran out of space or quota.
    #[error("destination capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// The store itself is unusable (corruption, closed handle).
    #[error("storage failure: {0}")]
    Storage(String),

    /// The backend refused this particular record (duplicate key, bad value).
    #[error("record rejected: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Transient(_) => "Transient",
            BackendError::CapacityExhausted(_) => "CapacityExhausted",
            BackendError::Storage(_) => "Storage",
            BackendError::Rejected(_) => "Rejected",
        }
    }
}

/// Why a record did not make it into the destination.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum RecordError {
    #[error("{0}")]
    Backend(BackendError),

    #[error("malformed row: {0}")]
    Shape(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: BackendError },
}

impl RecordError {
    pub fn kind(&self) -> String {
        match self {
            RecordError::Backend(err) => format!("BackendError::{}", err.kind()),
            RecordError::Shape(_) => "ShapeError".to_string(),
            RecordError::RetriesExhausted { .. } => "RetriesExhausted".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecordError::Backend(BackendError::Transient(_)) | RecordError::RetriesExhausted { .. }
        )
    }
}

impl From<BackendError> for RecordError {
    fn from(err: BackendError) -> Self {
        RecordError::Backend(err)
    }
}
