use crate::{
    bad_records::BadRecordSink,
    error::{ControllerError, LoadError},
    hooks::LoadHooks,
    loader::{Loader, LoaderEvent, short_id},
};
use chrono::{DateTime, Utc};
use connectors::{
    error::SourceError,
    shape::RecordShaper,
    source::{DataSource, SourceEvent, SourceState},
};
use counters::Counters;
use engine_config::{
    report::summary::{JobReport, JobStatus},
    settings::job::JobConfig,
};
use engine_core::metrics::Throughput;
use model::{
    execution::errors::{BackendError, RecordError},
    records::record::Record,
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub mod counters;

/// Owns the row counters and drives the source, loader and bad record log.
///
/// Every input is a method call made by the job loop; the controller never
/// blocks and never spawns. Outgoing work goes through the loader's executor
/// and the bad record sink, and comes back later as further calls.
pub struct Controller {
    config: JobConfig,
    run_id: String,
    source: Box<dyn DataSource>,
    loader: Loader,
    shaper: Box<dyn RecordShaper>,
    hooks: Box<dyn LoadHooks>,
    bad_records: Box<dyn BadRecordSink>,
    counters: Counters,
    skip_target: u64,
    header_pending: bool,
    shutdown_requested: bool,
    logger_ended: bool,
    finished: bool,
    cancelled: bool,
    timer_active: bool,
    ticks: u64,
    abort_reason: Option<String>,
    source_error: Option<String>,
    started_at: DateTime<Utc>,
    throughput: Throughput,
}

impl Controller {
    pub fn new(
        config: JobConfig,
        source: Box<dyn DataSource>,
        loader: Loader,
        shaper: Box<dyn RecordShaper>,
        hooks: Box<dyn LoadHooks>,
        bad_records: Box<dyn BadRecordSink>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;

        if loader.is_atomic() != config.is_atomic() {
            return Err(ControllerError::LoaderMismatch {
                expected_atomic: config.is_atomic(),
            });
        }

        if config.is_atomic() && config.max_rows.is_none() && !source.is_bounded() {
            return Err(ControllerError::UnboundedTransaction);
        }

        Ok(Controller {
            skip_target: config.skip_target(),
            header_pending: config.header,
            run_id: short_id(0),
            config,
            source,
            loader,
            shaper,
            hooks,
            bad_records,
            counters: Counters::default(),
            shutdown_requested: false,
            logger_ended: false,
            finished: false,
            cancelled: false,
            timer_active: false,
            ticks: 0,
            abort_reason: None,
            source_error: None,
            started_at: Utc::now(),
            throughput: Throughput::start(),
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn source_state(&self) -> SourceState {
        self.source.state()
    }

    pub fn source_is_producing(&self) -> bool {
        self.source.is_producing()
    }

    /// Polls the source. Only meaningful while [`Self::source_is_producing`].
    pub async fn next_source_event(&mut self) -> SourceEvent {
        self.source.next_event().await
    }

    pub fn timer_active(&self) -> bool {
        self.timer_active
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.tick_interval_ms)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn logger_ended(&self) -> bool {
        self.logger_ended
    }

    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }

    pub fn start(&mut self) {
        self.started_at = Utc::now();
        self.throughput = Throughput::start();

        let skipping = self.skip_target > 0 || self.config.worker_id != 0;
        self.source.skip(skipping);
        self.source.start();

        info!(
            job = %self.config.name,
            run_id = %self.run_id,
            atomic = self.loader.is_atomic(),
            skip_rows = self.config.skip_rows,
            max_rows = ?self.config.max_rows,
            worker_id = self.config.worker_id,
            n_workers = self.config.n_workers,
            "Starting load"
        );
    }

    pub fn on_source_event(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Item(record) => self.on_new_item(record),
            SourceEvent::Discarded(record) => self.on_discarded_item(record),
            SourceEvent::Finished(err) => self.on_source_finished(err),
        }
    }

    pub fn on_new_item(&mut self, mut record: Record) {
        self.counters.processed += 1;

        if let Err(err) = self.shaper.shape(&mut record) {
            debug!(record_id = record.id, error = %err, "Row could not be shaped");
            let reason = format!("row {} could not be shaped: {err}", record.id);
            record.fail(RecordError::Shape(err.to_string()));
            self.on_record_complete(record);
            if self.loader.is_atomic() {
                self.fail_job(reason);
            }
        } else if !self.hooks.on_read_record(&record) {
            debug!(record_id = record.id, "Row vetoed");
            self.counters.skipped += 1;
        } else {
            self.loader.load_item(record);
        }

        self.check_max_rows();

        if self.source.state() == SourceState::Running && self.config.n_workers > 1 {
            self.source.skip(true);
        }

        if !self.loader.is_atomic()
            && self.source.state() == SourceState::Running
            && self.counters.lead() > self.config.max_lead
        {
            info!(
                lead = self.counters.lead(),
                max_lead = self.config.max_lead,
                "Pausing source"
            );
            self.source.pause();
            self.loader.data_source_is_paused();
        }

        self.maybe_end_logger();
    }

    pub fn on_discarded_item(&mut self, record: Record) {
        self.counters.processed += 1;
        self.counters.skipped += 1;

        if self.header_pending {
            self.header_pending = false;
            if let Err(err) = self.shaper.discover_columns(&record) {
                error!(error = %err, "Could not read column names from header row");
                self.fail_job(format!("Invalid header row: {err}"));
                return;
            }
        }

        self.check_max_rows();

        let n_workers = u64::from(self.config.n_workers);
        if self.counters.skipped >= self.skip_target
            && self.counters.processed % n_workers == u64::from(self.config.worker_id)
        {
            self.source.skip(false);
        }

        self.maybe_end_logger();
    }

    pub fn on_source_finished(&mut self, err: Option<SourceError>) {
        match err {
            Some(err) => {
                error!(error = %err, rows_processed = self.counters.processed, "Data source failed");
                self.source_error = Some(err.to_string());
                if self.loader.is_atomic() {
                    let events = self.loader.cancel(&format!("source failed: {err}"));
                    self.handle_loader_events(events);
                }
            }
            None => info!(rows_processed = self.counters.processed, "Data source finished"),
        }

        self.shutdown_requested = true;
        self.loader.end();
        self.maybe_end_logger();
    }

    pub fn on_operation_result(&mut self, record: Record, result: Result<(), BackendError>) {
        let events = self.loader.on_result(record, result);
        self.handle_loader_events(events);
        self.maybe_end_logger();
    }

    pub fn on_commit_result(&mut self, result: Result<(), BackendError>) {
        let events = self.loader.on_commit_result(result);
        self.handle_loader_events(events);
        self.maybe_end_logger();
    }

    fn handle_loader_events(&mut self, events: Vec<LoaderEvent>) {
        for event in events {
            match event {
                LoaderEvent::Completed(record) => self.on_record_complete(record),
                LoaderEvent::Aborted(err) => self.on_loader_aborted(err),
            }
        }
    }

    fn on_record_complete(&mut self, record: Record) {
        self.counters.complete += 1;

        if record.is_failed() {
            self.counters.error += 1;
            self.hooks.on_record_error(&record);
            self.bad_records.log_record(record);
        } else {
            self.hooks.on_record_stored(&record);
        }

        if self.source.is_paused() && self.counters.lead() < self.config.min_lead {
            info!(
                lead = self.counters.lead(),
                min_lead = self.config.min_lead,
                "Resuming source"
            );
            self.source.resume();
            self.loader.data_source_resumed();
        }

        if !self.maybe_end_logger() && !self.loader.is_atomic() && !self.timer_active {
            debug!("Starting batch size timer");
            self.timer_active = true;
        }
    }

    fn on_loader_aborted(&mut self, err: LoadError) {
        error!(error = %err, "Loader aborted");
        self.abort(err.to_string());
    }

    /// Aborts from the controller's side; an open transaction is rolled back.
    fn fail_job(&mut self, reason: String) {
        self.abort(reason.clone());
        let events = self.loader.cancel(&reason);
        self.handle_loader_events(events);
    }

    fn abort(&mut self, reason: String) {
        if self.abort_reason.is_none() {
            self.abort_reason = Some(reason);
        }
        self.source.end();
    }

    fn check_max_rows(&mut self) {
        let Some(max_rows) = self.config.max_rows else {
            return;
        };

        if self.counters.processed >= max_rows
            && matches!(
                self.source.state(),
                SourceState::Running | SourceState::Paused
            )
        {
            info!(max_rows, "Row limit reached, ending source");
            self.source.end();
        }
    }

    /// Ends the bad record log once the source is done and every row is
    /// accounted for. After an abort the loader only has to be idle.
    fn maybe_end_logger(&mut self) -> bool {
        if self.logger_ended {
            return true;
        }

        let drained = self.counters.is_terminal() || self.abort_reason.is_some();
        if self.shutdown_requested && drained && self.loader.is_idle() {
            self.logger_ended = true;
            info!(
                rows_error = self.counters.error,
                "All rows accounted for, closing bad record log"
            );
            self.bad_records.end();
            return true;
        }
        false
    }

    pub fn on_tick(&mut self) {
        if !self.timer_active {
            return;
        }

        self.ticks += 1;
        self.loader.on_tick();
        self.hooks.on_tick();

        if self.config.report_every_ticks > 0 && self.ticks % self.config.report_every_ticks == 0 {
            let rate = self.throughput.roll(self.counters.complete);
            info!(
                rows_complete = self.counters.complete,
                rows_per_sec = format!("{rate:.1}"),
                batch_size = ?self.loader.target_batch_size(),
                lead = self.counters.lead(),
                "Throughput"
            );
        }
    }

    /// Cooperative cancellation: the source is ended and in-flight work drains.
    /// An atomic load rolls its transaction back instead of committing a prefix.
    pub fn cancel(&mut self) {
        if self.finished || self.cancelled {
            return;
        }
        warn!(rows_processed = self.counters.processed, "Cancellation requested, draining");
        self.cancelled = true;
        if self.loader.is_atomic() {
            let events = self.loader.cancel("job cancelled");
            self.handle_loader_events(events);
        }
        self.source.end();
        self.maybe_end_logger();
    }

    /// Last step of the shutdown sequence. Returns the final report.
    pub fn on_logger_finished(&mut self) -> JobReport {
        if self.finished {
            warn!("Bad record log reported finished twice");
            return self.report();
        }

        self.timer_active = false;
        self.finished = true;

        let report = self.report();
        self.hooks.on_finished(&report);
        info!(
            job = %report.job_name,
            rows_processed = report.rows_processed,
            rows_skipped = report.rows_skipped,
            rows_loaded = report.rows_loaded,
            rows_error = report.rows_error,
            elapsed_ms = report.elapsed_ms as u64,
            status = %report.status,
            "Load finished"
        );
        report
    }

    pub fn status(&self) -> JobStatus {
        if self.cancelled {
            JobStatus::Cancelled
        } else if self.abort_reason.is_some() || self.source_error.is_some() {
            JobStatus::Aborted
        } else if self.counters.error > 0 {
            JobStatus::CompletedWithErrors
        } else {
            JobStatus::Completed
        }
    }

    pub fn report(&self) -> JobReport {
        let c = self.counters;
        JobReport {
            job_name: self.config.name.clone(),
            run_id: self.run_id.clone(),
            status: self.status(),
            rows_processed: c.processed,
            rows_skipped: c.skipped,
            rows_loaded: c.loaded(),
            rows_error: c.error,
            elapsed_ms: self.throughput.elapsed().as_millis(),
            rows_per_sec: self.throughput.overall(c.complete),
            started_at: self.started_at,
            finished_at: Utc::now(),
            abort_reason: self.abort_reason.clone(),
            source_error: self.source_error.clone(),
        }
    }
}
