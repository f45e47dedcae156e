use model::{execution::errors::BackendError, records::record::Record};

/// Messages for the job loop.
///
/// Everything that finishes outside the loop reports back through these.
#[derive(Debug)]
pub enum JobMsg {
    /// One operation of an executed batch has an outcome.
    OperationDone {
        record: Record,
        result: Result<(), BackendError>,
    },

    /// The job transaction finished committing.
    CommitDone(Result<(), BackendError>),

    /// The bad record log has flushed everything it was given.
    LoggerFinished { written: u64, write_failures: u64 },
}

/// Messages for the bad record logger actor.
#[derive(Debug)]
pub enum LoggerMsg {
    /// Append a failed record.
    Log(Record),

    /// Flush and report back. Records logged afterwards are ignored.
    End,
}
