use model::records::record::Record;

pub mod writer;

pub use writer::{FailedRowWriter, FailedRowWriterError};

/// Destination for records that completed with an error.
///
/// Both calls are fire-and-forget. The owner is told separately, exactly once,
/// when everything logged before `end()` has been written.
pub trait BadRecordSink: Send {
    fn log_record(&mut self, record: Record);

    fn end(&mut self);
}
