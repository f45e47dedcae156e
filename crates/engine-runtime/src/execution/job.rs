use crate::{
    actor::messages::JobMsg,
    error::RuntimeError,
    execution::factory,
};
use connectors::backend::Backend;
use engine_config::{report::summary::JobReport, settings::spec::JobSpec};
use engine_core::metrics::Metrics;
use engine_processing::{controller::Controller, hooks::NoopHooks};
use std::sync::Arc;
use tokio::{
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

/// Builds and runs a job from its spec, returning the final report.
pub async fn run(spec: JobSpec, cancel: CancellationToken) -> Result<JobReport, RuntimeError> {
    let backend = factory::create_backend(&spec.backend).await?;
    factory::build_job(&spec, backend, Box::new(NoopHooks), cancel)
        .await?
        .run()
        .await
}

/// The event loop driving one job.
///
/// A single task owns the controller. It waits on cancellation, the job
/// mailbox, the batch size ticker and the data source, and hands whatever
/// arrives first to the controller.
pub struct JobRunner {
    controller: Controller,
    mailbox: UnboundedReceiver<JobMsg>,
    backend: Arc<dyn Backend>,
    tracker: TaskTracker,
    metrics: Metrics,
    logger_handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl JobRunner {
    pub fn new(
        controller: Controller,
        mailbox: UnboundedReceiver<JobMsg>,
        backend: Arc<dyn Backend>,
        tracker: TaskTracker,
        metrics: Metrics,
        logger_handle: JoinHandle<()>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            controller,
            mailbox,
            backend,
            tracker,
            metrics,
            logger_handle,
            cancel,
        }
    }

    pub fn run_id(&self) -> &str {
        self.controller.run_id()
    }

    pub async fn run(self) -> Result<JobReport, RuntimeError> {
        let JobRunner {
            mut controller,
            mut mailbox,
            backend,
            tracker,
            metrics,
            logger_handle,
            cancel,
        } = self;

        let mut ticker = time::interval(controller.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel_seen = false;

        controller.start();

        let report = loop {
            let timer_active = controller.timer_active();
            let producing = controller.source_is_producing();

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    controller.cancel();
                }

                msg = mailbox.recv() => match msg {
                    Some(JobMsg::OperationDone { record, result }) => {
                        controller.on_operation_result(record, result);
                    }
                    Some(JobMsg::CommitDone(result)) => controller.on_commit_result(result),
                    Some(JobMsg::LoggerFinished { written, write_failures }) => {
                        if write_failures > 0 {
                            warn!(written, write_failures, "Some bad records could not be written");
                        }
                        break controller.on_logger_finished();
                    }
                    None => return Err(RuntimeError::MailboxClosed),
                },

                _ = ticker.tick(), if timer_active => controller.on_tick(),

                event = controller.next_source_event(), if producing => {
                    controller.on_source_event(event);
                }
            }
        };

        // Rollbacks may still be running.
        tracker.close();
        tracker.wait().await;

        if let Err(e) = backend.close().await {
            warn!(backend = backend.name(), error = %e, "Failed to close backend");
        }

        let snapshot = metrics.snapshot();
        info!(
            run_id = %report.run_id,
            batches = snapshot.batches_executed,
            operations = snapshot.operations_executed,
            bytes = snapshot.bytes_written,
            retries = snapshot.retry_count,
            "Backend activity"
        );

        drop(controller);
        logger_handle.await?;

        Ok(report)
    }
}
