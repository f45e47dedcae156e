use crate::records::record::Record;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Fails with a rejection if the key already exists.
    Insert,
    /// Overwrites any existing value for the key.
    Upsert,
}

impl OperationKind {
    pub fn from_replace_mode(replace: bool) -> Self {
        if replace {
            OperationKind::Upsert
        } else {
            OperationKind::Insert
        }
    }
}

#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub record: Record,
}

/// Records submitted to a backend in one execute call.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub operations: Vec<Operation>,
    pub ts: chrono::DateTime<chrono::Utc>,
}

impl Batch {
    pub fn new(id: impl Into<String>) -> Self {
        Batch {
            id: id.into(),
            operations: Vec::new(),
            ts: chrono::Utc::now(),
        }
    }

    pub fn push(&mut self, kind: OperationKind, record: Record) {
        self.operations.push(Operation { kind, record });
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.operations
            .iter()
            .filter_map(|op| op.record.row())
            .map(|r| r.size_bytes())
            .sum()
    }

    pub fn into_records(self) -> impl Iterator<Item = Record> {
        self.operations.into_iter().map(|op| op.record)
    }
}
