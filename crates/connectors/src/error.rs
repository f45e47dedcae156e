use thiserror::Error;

/// Faults that stop a data source before it reaches a clean end of input.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),
}

impl SourceError {
    pub fn from_open(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.to_string()),
            std::io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(path.to_string()),
            _ => SourceError::Io(err),
        }
    }
}

/// Why a raw input line could not be turned into a typed row.
#[derive(Debug, Error, PartialEq)]
pub enum ShapeError {
    #[error("CSV parsing error: {0}")]
    Malformed(String),

    #[error("Expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("Missing key column: {0}")]
    MissingKey(String),

    #[error("Empty record")]
    Empty,
}
