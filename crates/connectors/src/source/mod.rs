use crate::error::SourceError;
use async_trait::async_trait;
use model::records::record::Record;

pub mod file;
pub mod synthetic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Created,
    Running,
    Paused,
    ShuttingDown,
    Finished,
}

/// What a source hands to its consumer for each poll.
#[derive(Debug)]
pub enum SourceEvent {
    /// A unit of input to be loaded.
    Item(Record),

    /// A unit of input consumed while skipping. Carries the record so a
    /// header row can still be inspected.
    Discarded(Record),

    /// Emitted exactly once. `Some` only when production stopped on a fault.
    Finished(Option<SourceError>),
}

/// A producer of records with a pause/resume/end lifecycle.
///
/// Sources are pulled: the owner awaits [`DataSource::next_event`] only while
/// [`DataSource::is_producing`] holds, so `pause()` and `end()` take effect
/// before the next item is produced.
#[async_trait]
pub trait DataSource: Send {
    fn start(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);

    /// False while running and once shutdown has been requested.
    fn is_paused(&self) -> bool;

    /// Requests shutdown. The terminal event is delivered on the next poll.
    fn end(&mut self);

    fn skip(&mut self, on: bool);
    fn is_skipping(&self) -> bool;

    fn state(&self) -> SourceState;

    /// Whether the input has a natural end.
    fn is_bounded(&self) -> bool;

    fn is_producing(&self) -> bool {
        matches!(
            self.state(),
            SourceState::Running | SourceState::ShuttingDown
        )
    }

    /// Produces the next event. Pends forever when the source is not producing.
    /// Must be cancel safe: dropping the future loses no input.
    async fn next_event(&mut self) -> SourceEvent;
}

/// State machine shared by the source implementations.
#[derive(Debug)]
pub struct SourceLifecycle {
    state: SourceState,
    skipping: bool,
}

impl SourceLifecycle {
    pub fn new() -> Self {
        SourceLifecycle {
            state: SourceState::Created,
            skipping: false,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == SourceState::Created {
            self.state = SourceState::Running;
        }
    }

    pub fn pause(&mut self) {
        if self.state == SourceState::Running {
            self.state = SourceState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == SourceState::Paused {
            self.state = SourceState::Running;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state == SourceState::Paused
    }

    pub fn end(&mut self) {
        if matches!(
            self.state,
            SourceState::Created | SourceState::Running | SourceState::Paused
        ) {
            self.state = SourceState::ShuttingDown;
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state == SourceState::ShuttingDown
    }

    pub fn finish(&mut self) {
        self.state = SourceState::Finished;
    }

    pub fn set_skipping(&mut self, on: bool) {
        self.skipping = on;
    }

    pub fn is_skipping(&self) -> bool {
        self.skipping
    }

    /// Wraps a produced record according to the skip flag.
    pub fn emit(&self, record: Record) -> SourceEvent {
        if self.skipping {
            SourceEvent::Discarded(record)
        } else {
            SourceEvent::Item(record)
        }
    }

    /// Marks the source finished and builds the terminal event.
    pub fn finished(&mut self, error: Option<SourceError>) -> SourceEvent {
        self.finish();
        SourceEvent::Finished(error)
    }
}

impl Default for SourceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
