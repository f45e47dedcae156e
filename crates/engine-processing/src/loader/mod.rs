use crate::error::LoadError;
use model::{
    execution::errors::BackendError,
    records::{batch::Batch, record::Record},
};

pub mod adaptive;
pub mod atomic;
pub mod fib;

pub use adaptive::AdaptiveLoader;
pub use atomic::AtomicLoader;

/// Dispatches work to a backend without waiting for it.
///
/// Outcomes come back later as one `(record, result)` per operation, in any
/// order, and one commit result per `commit()`.
pub trait BatchExecutor: Send {
    fn execute(&mut self, batch: Batch);
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// What a loader hands back to the controller.
#[derive(Debug)]
pub enum LoaderEvent {
    /// A record reached its terminal outcome; it may carry an error.
    Completed(Record),
    /// The loader stopped accepting work.
    Aborted(LoadError),
}

pub(crate) fn short_id(seq: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seq.to_le_bytes());
    hasher.update(
        &chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .to_le_bytes(),
    );
    hasher.finalize().to_hex()[..16].to_string()
}

/// The two loading strategies, picked once per job.
pub enum Loader {
    Adaptive(AdaptiveLoader),
    Atomic(AtomicLoader),
}

impl Loader {
    pub fn is_atomic(&self) -> bool {
        matches!(self, Loader::Atomic(_))
    }

    pub fn load_item(&mut self, record: Record) {
        match self {
            Loader::Adaptive(l) => l.load_item(record),
            Loader::Atomic(l) => l.load_item(record),
        }
    }

    pub fn on_result(
        &mut self,
        record: Record,
        result: Result<(), BackendError>,
    ) -> Vec<LoaderEvent> {
        match self {
            Loader::Adaptive(l) => l.on_result(record, result),
            Loader::Atomic(l) => l.on_result(record, result),
        }
    }

    pub fn on_commit_result(&mut self, result: Result<(), BackendError>) -> Vec<LoaderEvent> {
        match self {
            Loader::Adaptive(_) => {
                tracing::warn!("Commit result delivered to an adaptive loader, ignoring");
                Vec::new()
            }
            Loader::Atomic(l) => l.on_commit_result(result),
        }
    }

    pub fn data_source_is_paused(&mut self) {
        if let Loader::Adaptive(l) = self {
            l.data_source_is_paused();
        }
    }

    pub fn data_source_resumed(&mut self) {
        if let Loader::Adaptive(l) = self {
            l.data_source_resumed();
        }
    }

    pub fn on_tick(&mut self) {
        if let Loader::Adaptive(l) = self {
            l.on_tick();
        }
    }

    pub fn end(&mut self) {
        match self {
            Loader::Adaptive(l) => l.end(),
            Loader::Atomic(l) => l.end(),
        }
    }

    /// Rolls back an open transaction. Adaptive loaders keep draining.
    pub fn cancel(&mut self, reason: &str) -> Vec<LoaderEvent> {
        match self {
            Loader::Adaptive(_) => Vec::new(),
            Loader::Atomic(l) => l.cancel(reason),
        }
    }

    /// No queued records and no outstanding backend work.
    pub fn is_idle(&self) -> bool {
        match self {
            Loader::Adaptive(l) => l.is_idle(),
            Loader::Atomic(l) => l.is_idle(),
        }
    }

    pub fn target_batch_size(&self) -> Option<usize> {
        match self {
            Loader::Adaptive(l) => Some(l.target_batch_size()),
            Loader::Atomic(_) => None,
        }
    }
}
