use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    batches_executed: AtomicU64,
    operations_executed: AtomicU64,
    bytes_written: AtomicU64,
    retry_count: AtomicU64,
    failure_count: AtomicU64,
}

/// Backend-facing counters, shared with spawned executor tasks.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_executed: u64,
    pub operations_executed: u64,
    pub bytes_written: u64,
    pub retry_count: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn record_batch(&self, operations: u64, bytes: u64) {
        self.inner.batches_executed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .operations_executed
            .fetch_add(operations, Ordering::Relaxed);
        self.inner.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_executed: self.inner.batches_executed.load(Ordering::Relaxed),
            operations_executed: self.inner.operations_executed.load(Ordering::Relaxed),
            bytes_written: self.inner.bytes_written.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling rows-per-second figure, for logging only.
#[derive(Debug, Clone)]
pub struct Throughput {
    started: Instant,
    window_start: Instant,
    window_count: u64,
}

impl Throughput {
    pub fn start() -> Self {
        let now = Instant::now();
        Throughput {
            started: now,
            window_start: now,
            window_count: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Overall rate since start.
    pub fn overall(&self, total: u64) -> f64 {
        rate(total, self.started.elapsed())
    }

    /// Rate since the previous call, then starts a new window.
    pub fn roll(&mut self, total: u64) -> f64 {
        let now = Instant::now();
        let r = rate(
            total.saturating_sub(self.window_count),
            now.duration_since(self.window_start),
        );
        self.window_start = now;
        self.window_count = total;
        r
    }
}

pub fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= f64::EPSILON {
        0.0
    } else {
        count as f64 / secs
    }
}
