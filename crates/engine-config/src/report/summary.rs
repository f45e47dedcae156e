use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    CompletedWithErrors,
    Aborted,
    Cancelled,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Completed => "completed",
            JobStatus::CompletedWithErrors => "completed with errors",
            JobStatus::Aborted => "aborted",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Final counts of a job, produced on every exit path.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_name: String,
    pub run_id: String,
    pub status: JobStatus,
    pub rows_processed: u64,
    pub rows_skipped: u64,
    pub rows_loaded: u64,
    pub rows_error: u64,
    pub elapsed_ms: u128,
    pub rows_per_sec: f64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub abort_reason: Option<String>,
    pub source_error: Option<String>,
}

impl JobReport {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} processed, {} skipped, {} loaded, {} failed ({})",
            self.job_name,
            self.rows_processed,
            self.rows_skipped,
            self.rows_loaded,
            self.rows_error,
            self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: JobStatus) -> JobReport {
        let now = Utc::now();
        JobReport {
            job_name: "orders".to_string(),
            run_id: "r1".to_string(),
            status,
            rows_processed: 10,
            rows_skipped: 3,
            rows_loaded: 6,
            rows_error: 1,
            elapsed_ms: 1500,
            rows_per_sec: 4.0,
            started_at: now,
            finished_at: now,
            abort_reason: None,
            source_error: None,
        }
    }

    #[test]
    fn test_summary_line() {
        let r = report(JobStatus::CompletedWithErrors);
        assert_eq!(
            r.summary_line(),
            "orders: 10 processed, 3 skipped, 6 loaded, 1 failed (completed with errors)"
        );
        assert!(!r.is_success());
    }

    #[test]
    fn test_serializes_status_snake_case() {
        let json = serde_json::to_value(report(JobStatus::Completed)).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["rows_loaded"], 6);
    }
}
