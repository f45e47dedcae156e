use thiserror::Error;

/// Errors raised when loading or validating a job configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A knob holds a value outside its allowed range.
    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The job file could not be read.
    #[error("Failed to read job file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The job file is not valid JSON for a job spec.
    #[error("Failed to parse job file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The delimiter must be a single byte.
    #[error("Unsupported delimiter: {0:?}")]
    UnsupportedDelimiter(String),
}

impl SettingsError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SettingsError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
