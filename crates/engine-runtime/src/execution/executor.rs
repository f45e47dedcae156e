use crate::actor::{actor::ActorRef, messages::JobMsg};
use connectors::backend::{Backend, Transaction};
use engine_core::metrics::Metrics;
use engine_processing::loader::BatchExecutor;
use model::{execution::errors::BackendError, records::batch::Batch};
use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

type SharedTransaction = Arc<Mutex<Option<Box<dyn Transaction>>>>;

#[derive(Clone)]
enum Mode {
    Direct,
    Transactional(SharedTransaction),
}

/// Runs loader batches against a backend on spawned tasks.
///
/// Every operation's outcome is posted to the job mailbox as its own message,
/// and every commit produces exactly one `CommitDone`.
pub struct BackendExecutor {
    backend: Arc<dyn Backend>,
    mode: Mode,
    job: ActorRef<JobMsg>,
    tracker: TaskTracker,
    metrics: Metrics,
}

impl BackendExecutor {
    pub fn direct(
        backend: Arc<dyn Backend>,
        job: ActorRef<JobMsg>,
        tracker: TaskTracker,
        metrics: Metrics,
    ) -> Self {
        Self {
            backend,
            mode: Mode::Direct,
            job,
            tracker,
            metrics,
        }
    }

    /// Opens the job transaction up front; every batch runs inside it.
    pub async fn transactional(
        backend: Arc<dyn Backend>,
        job: ActorRef<JobMsg>,
        tracker: TaskTracker,
        metrics: Metrics,
    ) -> Result<Self, BackendError> {
        let txn = backend.begin().await?;
        debug!(backend = backend.name(), "Transaction opened");
        Ok(Self {
            backend,
            mode: Mode::Transactional(Arc::new(Mutex::new(Some(txn)))),
            job,
            tracker,
            metrics,
        })
    }

    fn transaction(&self) -> Option<SharedTransaction> {
        match &self.mode {
            Mode::Direct => None,
            Mode::Transactional(txn) => Some(txn.clone()),
        }
    }
}

impl BatchExecutor for BackendExecutor {
    fn execute(&mut self, batch: Batch) {
        let backend = self.backend.clone();
        let mode = self.mode.clone();
        let job = self.job.clone();
        let metrics = self.metrics.clone();

        self.tracker.spawn(async move {
            let started = Instant::now();
            let bytes = batch.size_bytes() as u64;
            let ops = batch.operations;

            let results = match &mode {
                Mode::Direct => backend.execute(&ops).await,
                Mode::Transactional(txn) => match txn.lock().await.as_mut() {
                    Some(txn) => txn.execute(&ops).await,
                    None => Vec::new(),
                },
            };
            metrics.record_batch(ops.len() as u64, bytes);

            let failed = results.iter().filter(|r| r.is_err()).count();
            debug!(
                batch_id = %batch.id,
                size = ops.len(),
                failed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Batch executed"
            );

            // A missing outcome fails its record only; Storage would abort the job.
            let padded = results.into_iter().map(Some).chain(std::iter::repeat_with(|| None));
            for (op, result) in ops.into_iter().zip(padded) {
                let result = result.unwrap_or_else(|| {
                    Err(BackendError::Rejected(
                        "backend returned no outcome for operation".to_string(),
                    ))
                });
                if job
                    .send(JobMsg::OperationDone {
                        record: op.record,
                        result,
                    })
                    .is_err()
                {
                    warn!(batch_id = %batch.id, "Job mailbox closed, dropping outcomes");
                    break;
                }
            }
        });
    }

    fn commit(&mut self) {
        let job = self.job.clone();
        let txn = self.transaction();

        self.tracker.spawn(async move {
            let result = match txn {
                None => Ok(()),
                Some(txn) => match txn.lock().await.take() {
                    Some(txn) => txn.commit().await,
                    None => Err(BackendError::Storage(
                        "transaction already closed".to_string(),
                    )),
                },
            };
            if let Err(e) = &result {
                error!(error = %e, "Commit failed");
            }
            let _ = job.send(JobMsg::CommitDone(result));
        });
    }

    fn rollback(&mut self) {
        let Some(txn) = self.transaction() else {
            return;
        };

        self.tracker.spawn(async move {
            let Some(txn) = txn.lock().await.take() else {
                return;
            };
            match txn.rollback().await {
                Ok(()) => debug!("Transaction rolled back"),
                Err(e) => error!(error = %e, "Rollback failed"),
            }
        });
    }
}
