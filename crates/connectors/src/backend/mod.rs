use async_trait::async_trait;
use model::{
    execution::errors::BackendError,
    records::{batch::Operation, row::RowData},
};

pub mod memory;
pub mod sled_store;

/// A storage destination for typed rows.
///
/// `execute` returns one outcome per operation, in submission order. An error
/// in one outcome never affects the others.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ops: &[Operation]) -> Vec<Result<(), BackendError>>;

    async fn begin(&self) -> Result<Box<dyn Transaction>, BackendError>;

    /// Flushes pending writes and releases the store.
    async fn close(&self) -> Result<(), BackendError>;
}

/// A unit of work whose operations become visible only on commit.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, ops: &[Operation]) -> Vec<Result<(), BackendError>>;

    async fn commit(self: Box<Self>) -> Result<(), BackendError>;

    async fn rollback(self: Box<Self>) -> Result<(), BackendError>;
}

/// The row an operation writes. Unshaped records are refused.
pub fn operation_row(op: &Operation) -> Result<&RowData, BackendError> {
    op.record
        .row()
        .ok_or_else(|| BackendError::Rejected(format!("record {} was never shaped", op.record.id)))
}
