use super::{Backend, Transaction, operation_row};
use async_trait::async_trait;
use model::{
    execution::errors::BackendError,
    records::{
        batch::{Operation, OperationKind},
        row::RowData,
    },
};
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<String, RowData>,
    /// Scripted failures per storage key, consumed one per execute.
    faults: HashMap<String, VecDeque<BackendError>>,
    commit_fault: Option<BackendError>,
    executed: usize,
    execute_calls: usize,
}

/// In-process destination with scripted fault injection.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every execute and commit, simulating a remote store.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next `times` operations on `key` fail with `err`.
    pub fn fail_key(&self, key: &str, err: BackendError, times: usize) {
        let mut state = self.lock();
        let queue = state.faults.entry(key.to_string()).or_default();
        queue.extend(std::iter::repeat_n(err, times));
    }

    pub fn fail_commit(&self, err: BackendError) {
        self.lock().commit_fault = Some(err);
    }

    pub fn get(&self, key: &str) -> Option<RowData> {
        self.lock().rows.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().rows.keys().cloned().collect()
    }

    /// Operations that reached the store, successful or not.
    pub fn executed(&self) -> usize {
        self.lock().executed
    }

    pub fn execute_calls(&self) -> usize {
        self.lock().execute_calls
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check(
        state: &mut MemoryState,
        op: &Operation,
        staged: &HashMap<String, RowData>,
    ) -> Result<(String, RowData), BackendError> {
        let row = operation_row(op)?;
        let key = row.storage_key();
        state.executed += 1;

        if let Some(queue) = state.faults.get_mut(&key)
            && let Some(err) = queue.pop_front()
        {
            return Err(err);
        }

        if op.kind == OperationKind::Insert
            && (state.rows.contains_key(&key) || staged.contains_key(&key))
        {
            return Err(BackendError::Rejected(format!("duplicate key {key}")));
        }
        Ok((key, row.clone()))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn execute(&self, ops: &[Operation]) -> Vec<Result<(), BackendError>> {
        self.delay().await;

        let mut state = self.lock();
        state.execute_calls += 1;
        let none = HashMap::new();
        ops.iter()
            .map(|op| {
                let (key, row) = Self::check(&mut state, op, &none)?;
                state.rows.insert(key, row);
                Ok(())
            })
            .collect()
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, BackendError> {
        Ok(Box::new(MemoryTransaction {
            backend: self.clone(),
            staged: HashMap::new(),
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    backend: MemoryBackend,
    staged: HashMap<String, RowData>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&mut self, ops: &[Operation]) -> Vec<Result<(), BackendError>> {
        self.backend.delay().await;

        let mut state = self.backend.lock();
        state.execute_calls += 1;
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match MemoryBackend::check(&mut state, op, &self.staged) {
                Ok((key, row)) => {
                    self.staged.insert(key, row);
                    results.push(Ok(()));
                }
                Err(e) => results.push(Err(e)),
            }
        }
        results
    }

    async fn commit(self: Box<Self>) -> Result<(), BackendError> {
        let MemoryTransaction { backend, staged } = *self;
        backend.delay().await;

        let mut state = backend.lock();
        if let Some(err) = state.commit_fault.take() {
            return Err(err);
        }
        state.rows.extend(staged);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::value::{FieldValue, Value},
        records::record::{Payload, Record},
    };

    fn insert(key: &str) -> Operation {
        let row = RowData::new("t", key, vec![FieldValue::new("k", Value::Null)]);
        Operation {
            kind: OperationKind::Insert,
            record: Record::new(0, Payload::Row(row)),
        }
    }

    #[tokio::test]
    async fn test_scripted_faults_are_consumed() {
        let backend = MemoryBackend::new();
        backend.fail_key("t/a", BackendError::Transient("lock".into()), 2);

        for _ in 0..2 {
            let res = backend.execute(&[insert("a")]).await;
            assert_eq!(res[0], Err(BackendError::Transient("lock".into())));
        }
        let res = backend.execute(&[insert("a")]).await;
        assert!(res[0].is_ok());
        assert_eq!(backend.len(), 1);
        assert_eq!(backend.executed(), 3);
    }

    #[tokio::test]
    async fn test_commit_fault_discards_staged_rows() {
        let backend = MemoryBackend::new();
        backend.fail_commit(BackendError::Storage("disk gone".into()));

        let mut tx = backend.begin().await.unwrap();
        let res = tx.execute(&[insert("a"), insert("b")]).await;
        assert!(res.iter().all(|r| r.is_ok()));
        assert!(tx.commit().await.is_err());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commit_applies() {
        let backend = MemoryBackend::new();
        let mut tx = backend.begin().await.unwrap();
        tx.execute(&[insert("a"), insert("b")]).await;
        assert!(backend.is_empty());
        tx.commit().await.unwrap();
        assert_eq!(backend.keys(), vec!["t/a".to_string(), "t/b".to_string()]);
    }
}
