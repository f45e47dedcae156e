use crate::settings::error::SettingsError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_LEAD: u64 = 2000;
pub const DEFAULT_MIN_LEAD: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
pub const DEFAULT_REPORT_EVERY_TICKS: u64 = 100;

/// Immutable job configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Label used in logs, reports and bad record entries
    pub name: String,
    /// Data rows to discard before loading starts
    pub skip_rows: u64,
    /// Hard stop after this many source rows, skipped rows included
    pub max_rows: Option<u64>,
    pub worker_id: u32,
    pub n_workers: u32,
    /// Load the whole job inside one backend transaction
    pub in_one_transaction: bool,
    /// Upsert instead of insert-only
    pub replace_mode: bool,
    /// Pause the source once the lead exceeds this
    pub max_lead: u64,
    /// Resume the source once the lead drops below this
    pub min_lead: u64,
    /// The first source row carries column names
    pub header: bool,
    /// Transient failures tolerated per record
    pub max_retries: u32,
    /// Ceiling for the adaptive batch size
    pub max_batch_size: usize,
    pub tick_interval_ms: u64,
    /// Throughput is logged every this many ticks
    pub report_every_ticks: u64,
    /// Column providing the storage key; the first column when unset
    pub key_column: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            name: "bulkload".to_string(),
            skip_rows: 0,
            max_rows: None,
            worker_id: 0,
            n_workers: 1,
            in_one_transaction: false,
            replace_mode: false,
            max_lead: DEFAULT_MAX_LEAD,
            min_lead: DEFAULT_MIN_LEAD,
            header: false,
            max_retries: DEFAULT_MAX_RETRIES,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            report_every_ticks: DEFAULT_REPORT_EVERY_TICKS,
            key_column: None,
        }
    }
}

impl JobConfig {
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.n_workers == 0 {
            return Err(SettingsError::invalid("n_workers", "must be at least 1"));
        }
        if self.worker_id >= self.n_workers {
            return Err(SettingsError::invalid(
                "worker_id",
                format!(
                    "{} is out of range for {} workers",
                    self.worker_id, self.n_workers
                ),
            ));
        }
        if self.min_lead >= self.max_lead {
            return Err(SettingsError::invalid(
                "min_lead",
                format!(
                    "{} must be below max_lead ({})",
                    self.min_lead, self.max_lead
                ),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(SettingsError::invalid("max_batch_size", "must be at least 1"));
        }
        if self.tick_interval_ms == 0 {
            return Err(SettingsError::invalid("tick_interval_ms", "must be at least 1"));
        }
        if self.report_every_ticks == 0 {
            return Err(SettingsError::invalid(
                "report_every_ticks",
                "must be at least 1",
            ));
        }
        if self.max_rows == Some(0) {
            return Err(SettingsError::invalid("max_rows", "must be at least 1"));
        }
        Ok(())
    }

    /// Rows discarded before the first loaded row: the header plus `skip_rows`.
    pub fn skip_target(&self) -> u64 {
        self.skip_rows + u64::from(self.header)
    }

    pub fn is_atomic(&self) -> bool {
        self.in_one_transaction
    }
}

#[derive(Debug, Default)]
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl JobConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn skip_rows(mut self, skip_rows: u64) -> Self {
        self.config.skip_rows = skip_rows;
        self
    }

    pub fn max_rows(mut self, max_rows: Option<u64>) -> Self {
        self.config.max_rows = max_rows;
        self
    }

    pub fn worker(mut self, worker_id: u32, n_workers: u32) -> Self {
        self.config.worker_id = worker_id;
        self.config.n_workers = n_workers;
        self
    }

    pub fn in_one_transaction(mut self, atomic: bool) -> Self {
        self.config.in_one_transaction = atomic;
        self
    }

    pub fn replace_mode(mut self, replace: bool) -> Self {
        self.config.replace_mode = replace;
        self
    }

    pub fn lead(mut self, min_lead: u64, max_lead: u64) -> Self {
        self.config.min_lead = min_lead;
        self.config.max_lead = max_lead;
        self
    }

    pub fn header(mut self, header: bool) -> Self {
        self.config.header = header;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.config.max_batch_size = max_batch_size;
        self
    }

    pub fn tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.config.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn report_every_ticks(mut self, ticks: u64) -> Self {
        self.config.report_every_ticks = ticks;
        self
    }

    pub fn key_column(mut self, key_column: Option<String>) -> Self {
        self.config.key_column = key_column;
        self
    }

    pub fn build(self) -> Result<JobConfig, SettingsError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = JobConfig::default();
        assert_eq!(config.max_lead, 2000);
        assert_eq!(config.min_lead, 1000);
        assert_eq!(config.n_workers, 1);
        assert!(!config.is_atomic());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = JobConfig::builder()
            .name("users")
            .skip_rows(3)
            .max_rows(Some(10))
            .header(true)
            .worker(1, 4)
            .build()
            .unwrap();

        assert_eq!(config.name, "users");
        assert_eq!(config.skip_target(), 4);
        assert_eq!(config.max_rows, Some(10));
        assert_eq!(config.worker_id, 1);
    }

    #[test]
    fn test_rejects_inverted_lead() {
        let err = JobConfig::builder().lead(500, 500).build().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "min_lead", .. }));
    }

    #[test]
    fn test_rejects_worker_out_of_range() {
        let err = JobConfig::builder().worker(2, 2).build().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "worker_id", .. }));

        let err = JobConfig::builder().worker(0, 0).build().unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { field: "n_workers", .. }));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: JobConfig =
            serde_json::from_str(r#"{ "name": "orders", "max_rows": 50, "replace_mode": true }"#)
                .unwrap();
        assert_eq!(config.name, "orders");
        assert_eq!(config.max_rows, Some(50));
        assert!(config.replace_mode);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let res: Result<JobConfig, _> = serde_json::from_str(r#"{ "batch_size": 5 }"#);
        assert!(res.is_err());
    }
}
