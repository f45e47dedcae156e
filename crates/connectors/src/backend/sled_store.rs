use super::{Backend, Transaction, operation_row};
use async_trait::async_trait;
use model::{
    execution::errors::BackendError,
    records::{
        batch::{Operation, OperationKind},
        row::RowData,
    },
};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::{collections::HashSet, path::Path};
use tracing::debug;

const ROWS_TREE: &str = "rows";

/// Maps a sled failure onto the backend error taxonomy.
pub fn classify_sled_error(err: sled::Error) -> BackendError {
    match err {
        sled::Error::Io(io) => classify_io_error(&io),
        other => BackendError::Storage(other.to_string()),
    }
}

pub fn classify_io_error(err: &std::io::Error) -> BackendError {
    use std::io::ErrorKind;

    // ENOSPC / EDQUOT
    if err.kind() == ErrorKind::StorageFull || matches!(err.raw_os_error(), Some(28) | Some(122)) {
        return BackendError::CapacityExhausted(err.to_string());
    }

    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
            BackendError::Transient(err.to_string())
        }
        _ => BackendError::Storage(err.to_string()),
    }
}

fn encode(row: &RowData) -> Result<Vec<u8>, BackendError> {
    bincode::serialize(row).map_err(|e| BackendError::Rejected(format!("encoding failed: {e}")))
}

pub fn decode(bytes: &[u8]) -> Result<RowData, BackendError> {
    bincode::deserialize(bytes).map_err(|e| BackendError::Storage(format!("decoding failed: {e}")))
}

/// Embedded key/value destination. Rows are stored under `entity/key`.
pub struct SledBackend {
    db: sled::Db,
    tree: sled::Tree,
}

impl SledBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let db = sled::open(path).map_err(classify_sled_error)?;
        Self::from_db(db)
    }

    pub fn temporary() -> Result<Self, BackendError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(classify_sled_error)?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, BackendError> {
        let tree = db.open_tree(ROWS_TREE).map_err(classify_sled_error)?;
        Ok(SledBackend { db, tree })
    }

    pub fn get(&self, key: &str) -> Result<Option<RowData>, BackendError> {
        match self.tree.get(key).map_err(classify_sled_error)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn apply(&self, op: &Operation) -> Result<(), BackendError> {
        let row = operation_row(op)?;
        let key = row.storage_key();
        let value = encode(row)?;

        match op.kind {
            OperationKind::Upsert => {
                self.tree
                    .insert(key.as_bytes(), value)
                    .map_err(classify_sled_error)?;
                Ok(())
            }
            OperationKind::Insert => {
                match self
                    .tree
                    .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))
                    .map_err(classify_sled_error)?
                {
                    Ok(()) => Ok(()),
                    Err(_) => Err(BackendError::Rejected(format!("duplicate key {key}"))),
                }
            }
        }
    }
}

#[async_trait]
impl Backend for SledBackend {
    fn name(&self) -> &str {
        "sled"
    }

    async fn execute(&self, ops: &[Operation]) -> Vec<Result<(), BackendError>> {
        ops.iter().map(|op| self.apply(op)).collect()
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, BackendError> {
        Ok(Box::new(SledTransaction {
            tree: self.tree.clone(),
            staged: Vec::new(),
            keys: HashSet::new(),
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        let bytes = self.db.flush_async().await.map_err(classify_sled_error)?;
        debug!(bytes, "Flushed sled backend");
        Ok(())
    }
}

/// Operations staged in memory and applied in one sled transaction on commit.
pub struct SledTransaction {
    tree: sled::Tree,
    staged: Vec<(OperationKind, String, Vec<u8>)>,
    keys: HashSet<String>,
}

impl SledTransaction {
    fn stage(&mut self, op: &Operation) -> Result<(), BackendError> {
        let row = operation_row(op)?;
        let key = row.storage_key();
        let value = encode(row)?;

        if op.kind == OperationKind::Insert {
            let exists = self
                .tree
                .contains_key(key.as_bytes())
                .map_err(classify_sled_error)?;
            if exists || self.keys.contains(&key) {
                return Err(BackendError::Rejected(format!("duplicate key {key}")));
            }
        }

        self.keys.insert(key.clone());
        self.staged.push((op.kind, key, value));
        Ok(())
    }
}

#[async_trait]
impl Transaction for SledTransaction {
    async fn execute(&mut self, ops: &[Operation]) -> Vec<Result<(), BackendError>> {
        ops.iter().map(|op| self.stage(op)).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), BackendError> {
        let SledTransaction { tree, staged, .. } = *self;
        let result = tree.transaction(|tx| {
            for (kind, key, value) in &staged {
                if *kind == OperationKind::Insert && tx.get(key.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(BackendError::Rejected(
                        format!("duplicate key {key}"),
                    )));
                }
                tx.insert(key.as_bytes(), value.as_slice())?;
            }
            Ok(())
        });

        match result {
            Ok(()) => {
                tree.flush_async().await.map_err(classify_sled_error)?;
                debug!(operations = staged.len(), "Committed sled transaction");
                Ok(())
            }
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(classify_sled_error(e)),
        }
    }

    async fn rollback(self: Box<Self>) -> Result<(), BackendError> {
        debug!(operations = self.staged.len(), "Discarded sled transaction");
        Ok(())
    }
}
