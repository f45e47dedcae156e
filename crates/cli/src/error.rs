use engine_config::settings::error::SettingsError;
use engine_runtime::error::RuntimeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to write the report: {0}")]
    ReportWrite(#[from] std::io::Error),

    #[error("Invalid job settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Failed to run the load: {0}")]
    Runner(#[from] RuntimeError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Missing input: {0}")]
    MissingInput(&'static str),
}
