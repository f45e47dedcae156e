use crate::error::CliError;
use clap::{Args, Subcommand, ValueEnum};
use engine_config::settings::{
    job::JobConfig,
    spec::{BackendSpec, BadRecordFormat, BadRecordSpec, DEFAULT_CHUNK_SIZE, JobSpec, SourceSpec},
};
use engine_runtime::execution::factory::default_store_path;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Load a delimited text file
    Load {
        #[arg(long, help = "JSON job file; flags below override its values")]
        job: Option<PathBuf>,

        #[arg(long, help = "Input file, one row per line")]
        file: Option<PathBuf>,

        #[arg(long, help = "Field delimiter: a single character or \"tab\"")]
        delimiter: Option<String>,

        #[arg(long, help = "Entity name used in storage keys")]
        entity: Option<String>,

        #[arg(long, help = "Bytes read from the file per chunk")]
        chunk_size: Option<usize>,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Load generated sequence rows
    Generate {
        #[arg(long, help = "Stop after this many rows; runs until interrupted otherwise")]
        rows: Option<u64>,

        #[arg(long, default_value = "seq", help = "Entity name used in storage keys")]
        entity: String,

        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        tuning: TuningArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Check a JSON job file and print it with defaults filled in
    Validate {
        #[arg(long, help = "JSON job file")]
        job: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Json,
    Raw,
}

impl From<FormatArg> for BadRecordFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => BadRecordFormat::Json,
            FormatArg::Raw => BadRecordFormat::Raw,
        }
    }
}

/// Where rows and failed rows go.
#[derive(Args, Debug)]
pub struct TargetArgs {
    #[arg(long, help = "Sled store directory")]
    store: Option<PathBuf>,

    #[arg(long, conflicts_with = "store", help = "Keep rows in memory (dry run)")]
    memory: bool,

    #[arg(long, help = "File receiving rows that failed to load")]
    bad_records: Option<PathBuf>,

    #[arg(long, value_enum, help = "Bad record file format")]
    bad_format: Option<FormatArg>,
}

impl TargetArgs {
    fn backend(&self, current: Option<BackendSpec>) -> Result<BackendSpec, CliError> {
        if self.memory {
            return Ok(BackendSpec::Memory);
        }
        if let Some(path) = &self.store {
            return Ok(BackendSpec::Sled { path: path.clone() });
        }
        match current {
            Some(spec) => Ok(spec),
            None => Ok(BackendSpec::Sled {
                path: default_store_path()?,
            }),
        }
    }

    fn bad_records(&self, current: Option<BadRecordSpec>) -> Option<BadRecordSpec> {
        let mut spec = match (&self.bad_records, current) {
            (Some(path), current) => Some(BadRecordSpec {
                path: path.clone(),
                format: current.map(|c| c.format).unwrap_or_default(),
            }),
            (None, current) => current,
        };
        if let (Some(spec), Some(format)) = (spec.as_mut(), self.bad_format) {
            spec.format = format.into();
        }
        spec
    }
}

/// Job configuration overrides.
#[derive(Args, Debug)]
pub struct TuningArgs {
    #[arg(long, help = "Job name used in logs and reports")]
    name: Option<String>,

    #[arg(long, help = "Data rows to discard before loading")]
    skip_rows: Option<u64>,

    #[arg(long, help = "Stop after this many source rows")]
    max_rows: Option<u64>,

    #[arg(long, help = "First line carries column names")]
    header: bool,

    #[arg(long, help = "This worker's position in the rotation")]
    worker_id: Option<u32>,

    #[arg(long, help = "Workers sharing the input round-robin")]
    workers: Option<u32>,

    #[arg(long, help = "Load everything in one transaction")]
    atomic: bool,

    #[arg(long, help = "Overwrite existing keys instead of rejecting them")]
    replace: bool,

    #[arg(long, help = "Pause reading when this many rows are in flight")]
    max_lead: Option<u64>,

    #[arg(long, help = "Resume reading below this many rows in flight")]
    min_lead: Option<u64>,

    #[arg(long, help = "Transient failures tolerated per row")]
    max_retries: Option<u32>,

    #[arg(long, help = "Largest batch the loader may grow to")]
    max_batch_size: Option<usize>,

    #[arg(long, help = "Column providing the storage key")]
    key_column: Option<String>,
}

impl TuningArgs {
    fn apply(&self, config: &mut JobConfig) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(skip_rows) = self.skip_rows {
            config.skip_rows = skip_rows;
        }
        if self.max_rows.is_some() {
            config.max_rows = self.max_rows;
        }
        if let Some(worker_id) = self.worker_id {
            config.worker_id = worker_id;
        }
        if let Some(workers) = self.workers {
            config.n_workers = workers;
        }
        if let Some(max_lead) = self.max_lead {
            config.max_lead = max_lead;
        }
        if let Some(min_lead) = self.min_lead {
            config.min_lead = min_lead;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(max_batch_size) = self.max_batch_size {
            config.max_batch_size = max_batch_size;
        }
        if self.key_column.is_some() {
            config.key_column = self.key_column.clone();
        }
        config.header |= self.header;
        config.in_one_transaction |= self.atomic;
        config.replace_mode |= self.replace;
    }
}

#[derive(Args, Debug)]
pub struct OutputArgs {
    #[arg(long, help = "Print the report as JSON instead of a table")]
    pub json: bool,

    #[arg(long, help = "Also write the JSON report to this file")]
    pub report: Option<PathBuf>,
}

fn load_job_file(job: Option<&PathBuf>) -> Result<Option<JobSpec>, CliError> {
    job.map(JobSpec::from_json_file).transpose().map_err(Into::into)
}

pub fn load_spec(
    job: Option<&PathBuf>,
    file: Option<&PathBuf>,
    delimiter: Option<&String>,
    entity: Option<&String>,
    chunk_size: Option<usize>,
    target: &TargetArgs,
    tuning: &TuningArgs,
) -> Result<JobSpec, CliError> {
    let base = load_job_file(job)?;
    let (mut config, source, backend, bad_records) = match base {
        Some(spec) => (
            spec.config,
            Some(spec.source),
            Some(spec.backend),
            spec.bad_records,
        ),
        None => (JobConfig::default(), None, None, None),
    };

    let source = match (source, file) {
        (Some(SourceSpec::File { path, chunk_size: c, delimiter: d, entity: e }), file) => {
            SourceSpec::File {
                path: file.cloned().unwrap_or(path),
                chunk_size: chunk_size.unwrap_or(c),
                delimiter: delimiter.cloned().unwrap_or(d),
                entity: entity.cloned().unwrap_or(e),
            }
        }
        (_, Some(path)) => SourceSpec::File {
            path: path.clone(),
            chunk_size: chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            delimiter: delimiter.cloned().unwrap_or_else(|| ",".to_string()),
            entity: entity.cloned().unwrap_or_else(|| "rows".to_string()),
        },
        (Some(other), None) => other,
        (None, None) => return Err(CliError::MissingInput("--file or a job file with a source")),
    };

    tuning.apply(&mut config);
    let spec = JobSpec {
        config,
        source,
        backend: target.backend(backend)?,
        bad_records: target.bad_records(bad_records),
    };
    spec.validate()?;
    Ok(spec)
}

pub fn generate_spec(
    rows: Option<u64>,
    entity: &str,
    target: &TargetArgs,
    tuning: &TuningArgs,
) -> Result<JobSpec, CliError> {
    let mut config = JobConfig {
        name: entity.to_string(),
        max_rows: rows,
        ..JobConfig::default()
    };
    tuning.apply(&mut config);

    let spec = JobSpec {
        config,
        source: SourceSpec::Synthetic {
            entity: entity.to_string(),
        },
        backend: target.backend(None)?,
        bad_records: target.bad_records(None),
    };
    spec.validate()?;
    Ok(spec)
}
