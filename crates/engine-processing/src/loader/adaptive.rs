use super::{BatchExecutor, LoaderEvent, fib::FibonacciSizer, short_id};
use crate::error::LoadError;
use engine_core::{
    metrics::Metrics,
    retry::{RecordVerdict, RetryBudget},
};
use model::{
    execution::errors::BackendError,
    records::{
        batch::{Batch, OperationKind},
        record::{LoadState, Record},
    },
};
use tracing::{debug, error};

/// Batches records into backend executes, sizing batches by throughput.
///
/// Every tick compares the outcomes seen in the last interval with the
/// interval before. A drop reverses direction; either way the target moves
/// one Fibonacci step. The first tick only records a baseline.
pub struct AdaptiveLoader {
    executor: Box<dyn BatchExecutor>,
    kind: OperationKind,
    batch: Batch,
    batch_seq: u64,
    sizer: FibonacciSizer,
    budget: RetryBudget,
    metrics: Metrics,
    /// Records handed to the executor without an outcome yet
    in_flight: u64,
    current_ops: u64,
    prior_ops: Option<u64>,
    source_paused: bool,
    ended: bool,
    aborted: bool,
}

impl AdaptiveLoader {
    pub fn new(
        executor: Box<dyn BatchExecutor>,
        kind: OperationKind,
        budget: RetryBudget,
        max_batch_size: usize,
        metrics: Metrics,
    ) -> Self {
        AdaptiveLoader {
            executor,
            kind,
            batch: Batch::new(short_id(0)),
            batch_seq: 0,
            sizer: FibonacciSizer::new(max_batch_size),
            budget,
            metrics,
            in_flight: 0,
            current_ops: 0,
            prior_ops: None,
            source_paused: false,
            ended: false,
            aborted: false,
        }
    }

    pub fn target_batch_size(&self) -> usize {
        self.sizer.target()
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight
    }

    pub fn load_item(&mut self, mut record: Record) {
        if self.aborted {
            debug!(record_id = record.id, "Loader aborted, dropping record");
            return;
        }

        record.state = LoadState::Pending;
        self.batch.push(self.kind, record);

        // Nothing else is coming soon while paused or ending, so don't wait for a full batch.
        if self.batch.len() >= self.sizer.target() || self.source_paused || self.ended {
            self.execute_batch();
        }
    }

    pub fn execute_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        self.batch_seq += 1;
        let mut batch = std::mem::replace(&mut self.batch, Batch::new(short_id(self.batch_seq)));
        for op in batch.operations.iter_mut() {
            op.record.state = LoadState::Executing;
        }

        self.in_flight += batch.len() as u64;
        debug!(
            batch_id = %batch.id,
            size = batch.len(),
            target = self.sizer.target(),
            "Executing batch"
        );
        self.executor.execute(batch);
    }

    pub fn on_result(
        &mut self,
        mut record: Record,
        result: Result<(), BackendError>,
    ) -> Vec<LoaderEvent> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.current_ops += 1;

        if self.aborted {
            debug!(record_id = record.id, "Dropping late outcome after abort");
            return Vec::new();
        }

        let err = match result {
            Ok(()) => {
                record.state = LoadState::Completed;
                return vec![LoaderEvent::Completed(record)];
            }
            Err(err) => err,
        };

        match self.budget.judge(record.attempts, err) {
            RecordVerdict::Resubmit { attempt } => {
                debug!(record_id = record.id, attempt, "Transient failure, resubmitting");
                record.attempts = attempt;
                record.state = LoadState::Retrying(attempt);
                self.metrics.increment_retries(1);
                self.sizer.shrink();
                self.load_item(record);
                Vec::new()
            }
            RecordVerdict::Fail(err) => {
                debug!(record_id = record.id, error = %err, "Record failed");
                record.fail(err);
                record.state = LoadState::Completed;
                self.metrics.increment_failures(1);
                vec![LoaderEvent::Completed(record)]
            }
            RecordVerdict::Abort(err) => {
                record.state = LoadState::Aborted;
                let dropped = self.batch.len();
                self.batch = Batch::new(short_id(self.batch_seq + 1));
                self.aborted = true;
                error!(
                    record_id = record.id,
                    error = %err,
                    dropped,
                    "Fatal destination error, loader stopped"
                );
                vec![LoaderEvent::Aborted(LoadError::Fatal(err))]
            }
        }
    }

    pub fn data_source_is_paused(&mut self) {
        self.source_paused = true;
        self.execute_batch();
    }

    pub fn data_source_resumed(&mut self) {
        self.source_paused = false;
    }

    pub fn on_tick(&mut self) {
        let current = std::mem::take(&mut self.current_ops);
        if let Some(prior) = self.prior_ops {
            if current < prior {
                self.sizer.reverse();
            }
            self.sizer.step();
        }
        self.prior_ops = Some(current);
    }

    pub fn end(&mut self) {
        self.ended = true;
        self.execute_batch();
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.batch.is_empty()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}
