use connectors::error::SourceError;
use engine_config::settings::error::SettingsError;
use engine_processing::{bad_records::FailedRowWriterError, error::ControllerError};
use model::execution::errors::BackendError;
use thiserror::Error;

/// Errors that stop a job before it can produce a report.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Bad record log error: {0}")]
    BadRecords(#[from] FailedRowWriterError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// An error occurred while joining a task.
    /// This usually indicates that the task was cancelled or panicked.
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Job mailbox closed before the load finished")]
    MailboxClosed,
}

/// Common error type for all actors in the engine.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("Mailbox closed")]
    MailboxClosed,

    #[error("Actor internal error: {0}")]
    Internal(String),
}
