use crate::settings::{error::SettingsError, job::JobConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_entity() -> String {
    "rows".to_string()
}

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Synthetic {
        #[serde(default = "default_entity")]
        entity: String,
    },
    File {
        path: PathBuf,
        #[serde(default = "default_chunk_size")]
        chunk_size: usize,
        #[serde(default = "default_delimiter")]
        delimiter: String,
        #[serde(default = "default_entity")]
        entity: String,
    },
}

impl SourceSpec {
    pub fn entity(&self) -> &str {
        match self {
            SourceSpec::Synthetic { entity } | SourceSpec::File { entity, .. } => entity,
        }
    }

    /// The field delimiter as a single byte. Synthetic sources use a comma.
    pub fn delimiter_byte(&self) -> Result<u8, SettingsError> {
        match self {
            SourceSpec::Synthetic { .. } => Ok(b','),
            SourceSpec::File { delimiter, .. } => parse_delimiter(delimiter),
        }
    }
}

pub fn parse_delimiter(delimiter: &str) -> Result<u8, SettingsError> {
    match delimiter {
        "\\t" | "tab" => Ok(b'\t'),
        d if d.len() == 1 => Ok(d.as_bytes()[0]),
        d => Err(SettingsError::UnsupportedDelimiter(d.to_string())),
    }
}

/// Where records go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSpec {
    Sled { path: PathBuf },
    Memory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadRecordFormat {
    /// One JSON object per failed record
    #[default]
    Json,
    /// The original source line, so the file can be loaded again
    Raw,
}

/// Side file receiving records that failed to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadRecordSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub format: BadRecordFormat,
}

/// Everything needed to assemble a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    #[serde(default)]
    pub config: JobConfig,
    pub source: SourceSpec,
    pub backend: BackendSpec,
    #[serde(default)]
    pub bad_records: Option<BadRecordSpec>,
}

impl JobSpec {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let spec: JobSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.config.validate()?;
        self.source.delimiter_byte()?;
        if let SourceSpec::File { chunk_size: 0, .. } = self.source {
            return Err(SettingsError::invalid("chunk_size", "must be at least 1"));
        }
        Ok(())
    }
}
