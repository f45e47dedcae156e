use model::execution::errors::BackendError;
use thiserror::Error;

/// Fatal loader conditions. Any of these stops the job.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("Destination failure: {0}")]
    Fatal(BackendError),

    #[error("Transaction rolled back, record {record_id} failed: {error}")]
    RolledBack { record_id: u64, error: BackendError },

    #[error("Transaction commit failed: {0}")]
    CommitFailed(BackendError),

    #[error("Transaction rolled back: {0}")]
    Cancelled(String),
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error(
        "Refusing to load an unbounded source in one transaction; set max_rows or use a bounded source"
    )]
    UnboundedTransaction,

    #[error("Loader mode does not match configuration (in_one_transaction = {expected_atomic})")]
    LoaderMismatch { expected_atomic: bool },

    #[error("Invalid configuration: {0}")]
    Settings(#[from] engine_config::settings::error::SettingsError),
}
