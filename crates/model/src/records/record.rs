use crate::{execution::errors::RecordError, records::row::RowData};
use serde::{Deserialize, Serialize};

/// What a data source produced for one unit of input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// An unparsed input line, waiting to be shaped.
    Raw(String),
    /// A typed row.
    Row(RowData),
}

/// Where a record came from in its source, kept for re-logging failed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub offset: u64,
    pub length: u64,
    pub line: Option<String>,
}

/// Per-record load progress.
///
/// `Pending -> Executing -> {Completed | Retrying(n) | Aborted}`; a retried
/// record goes back to `Pending` when it is re-batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Pending,
    Executing,
    Retrying(u32),
    Completed,
    Aborted,
}

/// The value object moving through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Zero-based position of the unit in the source.
    pub id: u64,
    pub payload: Payload,
    pub span: Option<SourceSpan>,
    pub state: LoadState,
    /// Number of transient failures seen so far.
    pub attempts: u32,
    error: Option<RecordError>,
}

impl Record {
    pub fn new(id: u64, payload: Payload) -> Self {
        Record {
            id,
            payload,
            span: None,
            state: LoadState::Pending,
            attempts: 0,
            error: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn error(&self) -> Option<&RecordError> {
        self.error.as_ref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Attaches the terminal error. The first error wins; later calls are ignored.
    pub fn fail(&mut self, err: impl Into<RecordError>) -> bool {
        if self.error.is_some() {
            return false;
        }
        self.error = Some(err.into());
        true
    }

    pub fn row(&self) -> Option<&RowData> {
        match &self.payload {
            Payload::Row(row) => Some(row),
            Payload::Raw(_) => None,
        }
    }

    /// The original text of the record, if it had one.
    pub fn raw_line(&self) -> Option<&str> {
        if let Some(line) = self.span.as_ref().and_then(|s| s.line.as_deref()) {
            return Some(line);
        }
        match &self.payload {
            Payload::Raw(line) => Some(line),
            Payload::Row(_) => None,
        }
    }
}
