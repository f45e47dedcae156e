use super::{BatchExecutor, LoaderEvent, short_id};
use crate::error::LoadError;
use model::{
    execution::errors::BackendError,
    records::{
        batch::{Batch, OperationKind},
        record::{LoadState, Record},
    },
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Accepting records.
    Open,
    /// The single batch is out; waiting for every outcome.
    Executing,
    Committing,
    Committed,
    RolledBack,
}

/// Loads the whole job as one batch inside one transaction.
///
/// Records are only reported complete after the commit succeeds, so either
/// every record is stored or none is.
pub struct AtomicLoader {
    executor: Box<dyn BatchExecutor>,
    kind: OperationKind,
    batch: Batch,
    state: TxnState,
    /// Records queued or executing without a successful outcome
    pending: u64,
    /// Operations dispatched without an outcome yet, successful or not
    outstanding: u64,
    acknowledged: Vec<Record>,
}

impl AtomicLoader {
    pub fn new(executor: Box<dyn BatchExecutor>, kind: OperationKind) -> Self {
        AtomicLoader {
            executor,
            kind,
            batch: Batch::new(short_id(0)),
            state: TxnState::Open,
            pending: 0,
            outstanding: 0,
            acknowledged: Vec::new(),
        }
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn load_item(&mut self, mut record: Record) {
        if self.state != TxnState::Open {
            warn!(
                record_id = record.id,
                state = ?self.state,
                "Transaction no longer open, dropping record"
            );
            return;
        }
        record.state = LoadState::Pending;
        self.pending += 1;
        self.batch.push(self.kind, record);
    }

    /// Dispatches the single batch, or commits straight away when it is empty.
    pub fn end(&mut self) {
        if self.state != TxnState::Open {
            return;
        }

        if self.batch.is_empty() {
            self.commit();
            return;
        }

        let mut batch = std::mem::replace(&mut self.batch, Batch::new(short_id(1)));
        for op in batch.operations.iter_mut() {
            op.record.state = LoadState::Executing;
        }
        self.outstanding = batch.len() as u64;
        self.state = TxnState::Executing;
        info!(batch_id = %batch.id, records = batch.len(), "Executing transaction batch");
        self.executor.execute(batch);
    }

    pub fn on_result(
        &mut self,
        mut record: Record,
        result: Result<(), BackendError>,
    ) -> Vec<LoaderEvent> {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.state != TxnState::Executing {
            debug!(record_id = record.id, state = ?self.state, "Ignoring outcome");
            return Vec::new();
        }

        match result {
            Ok(()) => {
                record.state = LoadState::Executing;
                self.acknowledged.push(record);
                self.pending = self.pending.saturating_sub(1);
                if self.pending == 0 {
                    self.commit();
                }
                Vec::new()
            }
            Err(error) => {
                error!(record_id = record.id, error = %error, "Record failed inside transaction");
                self.rollback();
                vec![LoaderEvent::Aborted(LoadError::RolledBack {
                    record_id: record.id,
                    error,
                })]
            }
        }
    }

    fn commit(&mut self) {
        self.state = TxnState::Committing;
        debug!(records = self.acknowledged.len(), "Committing transaction");
        self.executor.commit();
    }

    fn rollback(&mut self) {
        self.state = TxnState::RolledBack;
        self.acknowledged.clear();
        self.batch = Batch::new(short_id(2));
        self.pending = 0;
        self.executor.rollback();
    }

    pub fn on_commit_result(&mut self, result: Result<(), BackendError>) -> Vec<LoaderEvent> {
        if self.state != TxnState::Committing {
            warn!(state = ?self.state, "Unexpected commit result");
            return Vec::new();
        }

        match result {
            Ok(()) => {
                self.state = TxnState::Committed;
                info!(records = self.acknowledged.len(), "Transaction committed");
                self.acknowledged
                    .drain(..)
                    .map(|mut record| {
                        record.state = LoadState::Completed;
                        LoaderEvent::Completed(record)
                    })
                    .collect()
            }
            Err(err) => {
                error!(error = %err, "Transaction commit failed");
                self.state = TxnState::RolledBack;
                self.acknowledged.clear();
                vec![LoaderEvent::Aborted(LoadError::CommitFailed(err))]
            }
        }
    }

    /// Rolls back an open or executing transaction.
    pub fn cancel(&mut self, reason: &str) -> Vec<LoaderEvent> {
        match self.state {
            TxnState::Open | TxnState::Executing => {
                warn!(reason, pending = self.pending, "Rolling back transaction");
                self.rollback();
                vec![LoaderEvent::Aborted(LoadError::Cancelled(reason.to_string()))]
            }
            _ => Vec::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        match self.state {
            TxnState::Open => self.batch.is_empty(),
            TxnState::Executing | TxnState::Committing => false,
            TxnState::Committed | TxnState::RolledBack => self.outstanding == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::testing::RecordingExecutor;
    use model::{
        core::value::{FieldValue, Value},
        records::{record::Payload, row::RowData},
    };

    fn record(id: u64) -> Record {
        let row = RowData::new("t", id.to_string(), vec![FieldValue::new("id", Value::Uint(id))]);
        Record::new(id, Payload::Row(row))
    }

    fn loader() -> (AtomicLoader, RecordingExecutor) {
        let exec = RecordingExecutor::default();
        (
            AtomicLoader::new(Box::new(exec.clone()), OperationKind::Insert),
            exec,
        )
    }

    #[test]
    fn test_nothing_dispatched_before_end() {
        let (mut loader, exec) = loader();
        for i in 0..5 {
            loader.load_item(record(i));
        }
        assert!(exec.take_batches().is_empty());
        assert_eq!(loader.pending(), 5);
        assert!(!loader.is_idle());

        loader.end();
        let batches = exec.take_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 5);
        assert_eq!(loader.state(), TxnState::Executing);
    }

    #[test]
    fn test_commit_after_all_acknowledged() {
        let (mut loader, exec) = loader();
        for i in 0..3 {
            loader.load_item(record(i));
        }
        loader.end();
        let recs: Vec<_> = exec.take_batches().remove(0).into_records().collect();

        for rec in recs {
            assert!(loader.on_result(rec, Ok(())).is_empty());
        }
        assert_eq!(exec.commits(), 1);
        assert_eq!(loader.state(), TxnState::Committing);

        let events = loader.on_commit_result(Ok(()));
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| matches!(e, LoaderEvent::Completed(r) if !r.is_failed())));
        assert!(loader.is_idle());
    }

    #[test]
    fn test_any_failure_rolls_back_everything() {
        let (mut loader, exec) = loader();
        for i in 0..4 {
            loader.load_item(record(i));
        }
        loader.end();
        let mut recs: Vec<_> = exec.take_batches().remove(0).into_records().collect();

        let ok = recs.remove(0);
        assert!(loader.on_result(ok, Ok(())).is_empty());

        let bad = recs.remove(1);
        let events = loader.on_result(bad, Err(BackendError::Rejected("dup".into())));
        assert!(matches!(
            events.as_slice(),
            [LoaderEvent::Aborted(LoadError::RolledBack { record_id: 2, .. })]
        ));
        assert_eq!(exec.rollbacks(), 1);
        assert_eq!(exec.commits(), 0);
        assert!(!loader.is_idle());

        // late successes complete nothing
        for rec in recs {
            assert!(loader.on_result(rec, Ok(())).is_empty());
        }
        assert!(loader.is_idle());
        assert_eq!(loader.state(), TxnState::RolledBack);
    }

    #[test]
    fn test_commit_failure_aborts() {
        let (mut loader, exec) = loader();
        loader.load_item(record(0));
        loader.end();
        let rec = exec.take_batches().remove(0).into_records().next().unwrap();
        loader.on_result(rec, Ok(()));

        let events = loader.on_commit_result(Err(BackendError::Storage("io".into())));
        assert!(matches!(
            events.as_slice(),
            [LoaderEvent::Aborted(LoadError::CommitFailed(_))]
        ));
        assert!(loader.is_idle());
    }

    #[test]
    fn test_empty_job_commits_on_end() {
        let (mut loader, exec) = loader();
        assert!(loader.is_idle());
        loader.end();
        assert_eq!(exec.commits(), 1);
        assert!(!loader.is_idle());
        assert!(loader.on_commit_result(Ok(())).is_empty());
        assert!(loader.is_idle());
    }

    #[test]
    fn test_cancel_rolls_back_open_transaction() {
        let (mut loader, exec) = loader();
        loader.load_item(record(0));
        let events = loader.cancel("source failed");
        assert!(matches!(
            events.as_slice(),
            [LoaderEvent::Aborted(LoadError::Cancelled(_))]
        ));
        assert_eq!(exec.rollbacks(), 1);
        assert!(loader.is_idle());

        loader.end();
        assert!(exec.take_batches().is_empty());
    }
}
