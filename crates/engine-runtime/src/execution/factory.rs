use crate::{
    actor::{
        actor::ActorRef,
        logger::{BadRecordActor, BadRecordHandle},
        messages::JobMsg,
        spawn::spawn_actor,
    },
    error::RuntimeError,
    execution::{executor::BackendExecutor, job::JobRunner},
};
use connectors::{
    backend::{Backend, memory::MemoryBackend, sled_store::SledBackend},
    shape::DelimitedShaper,
    source::{DataSource, file::FileSource, synthetic::SyntheticSource},
};
use engine_config::settings::spec::{BackendSpec, JobSpec, SourceSpec};
use engine_core::{
    metrics::Metrics,
    retry::{RetryBudget, RetryError, RetryPolicy, classify_backend_error},
};
use engine_processing::{
    bad_records::FailedRowWriter,
    controller::Controller,
    hooks::LoadHooks,
    loader::{AdaptiveLoader, AtomicLoader, Loader},
};
use model::records::batch::OperationKind;
use std::{path::PathBuf, sync::Arc};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;
use uuid::Uuid;

/// Default location of the sled store when none is configured.
pub fn default_store_path() -> Result<PathBuf, RuntimeError> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        RuntimeError::InitializationError("Could not determine home directory".to_string())
    })?;
    Ok(home_dir.join(".bulkload/store"))
}

pub async fn create_source(spec: &SourceSpec) -> Result<Box<dyn DataSource>, RuntimeError> {
    match spec {
        SourceSpec::Synthetic { entity } => Ok(Box::new(SyntheticSource::new(entity))),
        SourceSpec::File {
            path, chunk_size, ..
        } => Ok(Box::new(FileSource::open(path, *chunk_size).await?)),
    }
}

/// Opens the backend, retrying transient failures such as a held file lock.
pub async fn create_backend(spec: &BackendSpec) -> Result<Arc<dyn Backend>, RuntimeError> {
    match spec {
        BackendSpec::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendSpec::Sled { path } => {
            let backend = RetryPolicy::default()
                .run(
                    || {
                        let path = path.clone();
                        async move { SledBackend::open(path) }
                    },
                    classify_backend_error,
                )
                .await
                .map_err(RetryError::into_inner)?;
            info!(path = %path.display(), "Opened sled store");
            Ok(Arc::new(backend))
        }
    }
}

/// Assembles a runnable job around an already opened backend.
pub async fn build_job(
    spec: &JobSpec,
    backend: Arc<dyn Backend>,
    hooks: Box<dyn LoadHooks>,
    cancel: CancellationToken,
) -> Result<JobRunner, RuntimeError> {
    spec.validate()?;
    let config = spec.config.clone();
    let run_id = Uuid::new_v4().to_string();

    let source = create_source(&spec.source).await?;
    let shaper = DelimitedShaper::new(spec.source.entity(), spec.source.delimiter_byte()?)
        .with_key_column(config.key_column.clone());

    let (job_ref, mailbox) = ActorRef::<JobMsg>::channel("job");

    let writer = match &spec.bad_records {
        Some(bad) => Some(FailedRowWriter::open(&bad.path, bad.format, &config.name).await?),
        None => None,
    };
    let (logger_ref, logger_handle) =
        spawn_actor("bad-records", BadRecordActor::new(writer, job_ref.clone()));
    let sink = BadRecordHandle::new(logger_ref, job_ref.clone());

    let tracker = TaskTracker::new();
    let metrics = Metrics::new();
    let kind = OperationKind::from_replace_mode(config.replace_mode);

    let loader = if config.is_atomic() {
        let executor = BackendExecutor::transactional(
            backend.clone(),
            job_ref.clone(),
            tracker.clone(),
            metrics.clone(),
        )
        .await?;
        Loader::Atomic(AtomicLoader::new(Box::new(executor), kind))
    } else {
        let executor =
            BackendExecutor::direct(backend.clone(), job_ref, tracker.clone(), metrics.clone());
        Loader::Adaptive(AdaptiveLoader::new(
            Box::new(executor),
            kind,
            RetryBudget::new(config.max_retries),
            config.max_batch_size,
            metrics.clone(),
        ))
    };

    let controller = Controller::new(
        config,
        source,
        loader,
        Box::new(shaper),
        hooks,
        Box::new(sink),
    )?
    .with_run_id(run_id);

    Ok(JobRunner::new(
        controller,
        mailbox,
        backend,
        tracker,
        metrics,
        logger_handle,
        cancel,
    ))
}
