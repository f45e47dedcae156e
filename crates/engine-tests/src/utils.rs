#![allow(dead_code)]

use connectors::backend::memory::MemoryBackend;
use engine_config::{
    report::summary::JobReport,
    settings::{
        job::{JobConfig, JobConfigBuilder},
        spec::{BackendSpec, BadRecordFormat, BadRecordSpec, DEFAULT_CHUNK_SIZE, JobSpec, SourceSpec},
    },
};
use engine_processing::hooks::{LoadHooks, NoopHooks};
use engine_runtime::execution::factory;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio_util::sync::CancellationToken;

/// Entity used for every file source in these scenarios.
pub const ENTITY: &str = "people";

/// Job configuration with a fast ticker so short runs still adapt.
pub fn config(name: &str) -> JobConfigBuilder {
    JobConfig::builder().name(name).tick_interval_ms(5)
}

/// Writes `lines` to `dir/name`, newline terminated.
pub fn write_input(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(&path, body).expect("write input file");
    path
}

/// `count` rows of `id,name,score`, ids starting at 1.
pub fn people_lines(count: u64) -> Vec<String> {
    (1..=count)
        .map(|i| format!("{i},person {i},{}", i * 3))
        .collect()
}

pub fn file_source(path: &Path, delimiter: &str) -> SourceSpec {
    SourceSpec::File {
        path: path.to_path_buf(),
        chunk_size: DEFAULT_CHUNK_SIZE,
        delimiter: delimiter.to_string(),
        entity: ENTITY.to_string(),
    }
}

pub fn synthetic_source(entity: &str) -> SourceSpec {
    SourceSpec::Synthetic {
        entity: entity.to_string(),
    }
}

pub fn bad_records(path: &Path, format: BadRecordFormat) -> Option<BadRecordSpec> {
    Some(BadRecordSpec {
        path: path.to_path_buf(),
        format,
    })
}

pub fn job_spec(config: JobConfig, source: SourceSpec, bad: Option<BadRecordSpec>) -> JobSpec {
    JobSpec {
        config,
        source,
        backend: BackendSpec::Memory,
        bad_records: bad,
    }
}

/// Runs a job against `backend` so the test can inspect it afterwards.
pub async fn run_on_memory(spec: &JobSpec, backend: &MemoryBackend) -> JobReport {
    run_with_hooks(spec, backend, Box::new(NoopHooks)).await
}

pub async fn run_with_hooks(
    spec: &JobSpec,
    backend: &MemoryBackend,
    hooks: Box<dyn LoadHooks>,
) -> JobReport {
    factory::build_job(spec, Arc::new(backend.clone()), hooks, CancellationToken::new())
        .await
        .expect("build job")
        .run()
        .await
        .expect("run job")
}

/// Lines of a bad record file, ignoring a trailing newline.
pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn read_json_lines(path: &Path) -> Vec<serde_json::Value> {
    read_lines(path)
        .iter()
        .map(|l| serde_json::from_str(l).expect("bad record line is JSON"))
        .collect()
}

pub fn key(id: impl std::fmt::Display) -> String {
    format!("{ENTITY}/{id}")
}

/// Asserts the report's counters add up.
pub fn assert_accounted(report: &JobReport) {
    assert_eq!(
        report.rows_processed,
        report.rows_skipped + report.rows_loaded + report.rows_error,
        "every processed row is skipped, loaded or failed: {report:?}"
    );
}
