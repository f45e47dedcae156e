use crate::{
    core::value::Value,
    execution::errors::RecordError,
    records::record::{Payload, Record},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Represents a record that failed to load, as written to the bad record log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRow {
    pub id: String,
    pub job_name: String,
    pub stage: ProcessingStage,
    pub record_id: u64,
    pub original_data: HashMap<String, Value>,
    pub source_line: Option<String>,
    pub source_offset: Option<u64>,
    pub error: FailureError,
    pub failed_at: DateTime<Utc>,
    pub table_name: Option<String>,
    pub attempt_number: Option<u32>,
}

/// The stage of the load where the failure occurred
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Failed while turning the raw input into a typed row
    Shape,

    /// Failed at the destination
    Load,

    /// Failed during a custom operation
    Custom(String),
}

/// Error information for a failed row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureError {
    pub error_type: String,
    pub message: String,
    pub details: Option<String>,
    pub is_retryable: bool,
}

impl FailedRow {
    /// Create a new FailedRow with minimal required information
    pub fn new(
        job_name: String,
        stage: ProcessingStage,
        record_id: u64,
        error_type: String,
        error_message: String,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_name,
            stage,
            record_id,
            original_data: HashMap::new(),
            source_line: None,
            source_offset: None,
            error: FailureError {
                error_type,
                message: error_message,
                details: None,
                is_retryable: false,
            },
            failed_at: Utc::now(),
            table_name: None,
            attempt_number: None,
        }
    }

    /// Builds the log entry for a record that completed with an error.
    /// Records without an error are described as an unknown failure.
    pub fn from_record(job_name: &str, record: &Record) -> Self {
        let (stage, error_type, message, retryable) = match record.error() {
            Some(err @ RecordError::Shape(_)) => {
                (ProcessingStage::Shape, err.kind(), err.to_string(), false)
            }
            Some(err) => (
                ProcessingStage::Load,
                err.kind(),
                err.to_string(),
                err.is_retryable(),
            ),
            None => (
                ProcessingStage::Load,
                "Unknown".to_string(),
                "record reported as failed without an error".to_string(),
                false,
            ),
        };

        let mut failed = FailedRow::new(
            job_name.to_string(),
            stage,
            record.id,
            error_type,
            message,
        )
        .with_retryable(retryable);

        if let Payload::Row(row) = &record.payload {
            failed.original_data = row
                .field_values
                .iter()
                .map(|f| (f.name.clone(), f.value.clone()))
                .collect();
            failed.table_name = Some(row.entity.clone());
        }

        failed.source_line = record.raw_line().map(str::to_string);
        failed.source_offset = record.span.as_ref().map(|s| s.offset);
        if record.attempts > 0 {
            failed.attempt_number = Some(record.attempts);
        }
        failed
    }

    /// Add table name
    pub fn with_table(mut self, table_name: String) -> Self {
        self.table_name = Some(table_name);
        self
    }

    /// Add attempt number for retry tracking
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt_number = Some(attempt);
        self
    }

    /// Mark error as retryable
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.error.is_retryable = retryable;
        self
    }

    /// Add detailed error information
    pub fn with_error_details(mut self, details: String) -> Self {
        self.error.details = Some(details);
        self
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Shape => write!(f, "Shape"),
            ProcessingStage::Load => write!(f, "Load"),
            ProcessingStage::Custom(name) => write!(f, "Custom({})", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::value::FieldValue,
        execution::errors::BackendError,
        records::{record::SourceSpan, row::RowData},
    };

    #[test]
    fn test_failed_row_creation() {
        let failed_row = FailedRow::new(
            "users_load".to_string(),
            ProcessingStage::Load,
            7,
            "BackendError::Rejected".to_string(),
            "duplicate key".to_string(),
        );

        assert_eq!(failed_row.job_name, "users_load");
        assert_eq!(failed_row.stage, ProcessingStage::Load);
        assert_eq!(failed_row.record_id, 7);
        assert_eq!(failed_row.error.message, "duplicate key");
        assert!(!failed_row.id.is_empty());
    }

    #[test]
    fn test_from_shaped_record() {
        let row = RowData::new(
            "orders",
            "17",
            vec![
                FieldValue::new("id", Value::Int(17)),
                FieldValue::new("total", Value::Float(9.5)),
            ],
        );
        let mut record = Record::new(17, Payload::Row(row)).with_span(SourceSpan {
            offset: 120,
            length: 8,
            line: Some("17,9.5".to_string()),
        });
        record.attempts = 2;
        record.fail(BackendError::Rejected("duplicate key".to_string()));

        let failed = FailedRow::from_record("orders_load", &record);

        assert_eq!(failed.stage, ProcessingStage::Load);
        assert_eq!(failed.error.error_type, "BackendError::Rejected");
        assert_eq!(failed.table_name.as_deref(), Some("orders"));
        assert_eq!(failed.source_line.as_deref(), Some("17,9.5"));
        assert_eq!(failed.source_offset, Some(120));
        assert_eq!(failed.attempt_number, Some(2));
        assert_eq!(failed.original_data.get("id"), Some(&Value::Int(17)));
    }

    #[test]
    fn test_from_shape_failure() {
        let mut record = Record::new(2, Payload::Raw("1,\"broken".to_string()));
        record.fail(RecordError::Shape("unterminated quote".to_string()));

        let failed = FailedRow::from_record("job", &record);
        assert_eq!(failed.stage, ProcessingStage::Shape);
        assert_eq!(failed.error.error_type, "ShapeError");
        assert_eq!(failed.source_line.as_deref(), Some("1,\"broken"));
        assert!(failed.original_data.is_empty());
    }

    #[test]
    fn test_processing_stage_display() {
        assert_eq!(ProcessingStage::Shape.to_string(), "Shape");
        assert_eq!(ProcessingStage::Load.to_string(), "Load");
        assert_eq!(
            ProcessingStage::Custom("veto".to_string()).to_string(),
            "Custom(veto)"
        );
    }
}
