use super::{DataSource, SourceEvent, SourceLifecycle, SourceState};
use async_trait::async_trait;
use chrono::Utc;
use model::{
    core::value::{FieldValue, Value},
    records::{
        record::{Payload, Record},
        row::RowData,
    },
};

/// Builds the rows produced by [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SequenceGenerator {
    entity: String,
}

impl SequenceGenerator {
    pub fn new(entity: &str) -> Self {
        SequenceGenerator {
            entity: entity.to_string(),
        }
    }

    pub fn row(&self, id: u64) -> RowData {
        let fields = vec![
            FieldValue::new("id", Value::Uint(id)),
            FieldValue::new("token", Value::Uuid(uuid::Uuid::new_v4())),
            FieldValue::new("amount", Value::Float((id % 10_000) as f64 * 0.25)),
            FieldValue::new("created_at", Value::Timestamp(Utc::now())),
        ];
        RowData::new(&self.entity, id.to_string(), fields)
    }
}

/// An endless generator of sequence rows.
///
/// Yields to the runtime before every item so a running generator never
/// starves backend completions or timers.
pub struct SyntheticSource {
    lifecycle: SourceLifecycle,
    generator: SequenceGenerator,
    next_id: u64,
}

impl SyntheticSource {
    pub fn new(entity: &str) -> Self {
        SyntheticSource {
            lifecycle: SourceLifecycle::new(),
            generator: SequenceGenerator::new(entity),
            next_id: 0,
        }
    }
}

#[async_trait]
impl DataSource for SyntheticSource {
    fn start(&mut self) {
        self.lifecycle.start();
    }

    fn pause(&mut self) {
        self.lifecycle.pause();
    }

    fn resume(&mut self) {
        self.lifecycle.resume();
    }

    fn is_paused(&self) -> bool {
        self.lifecycle.is_paused()
    }

    fn end(&mut self) {
        self.lifecycle.end();
    }

    fn skip(&mut self, on: bool) {
        self.lifecycle.set_skipping(on);
    }

    fn is_skipping(&self) -> bool {
        self.lifecycle.is_skipping()
    }

    fn state(&self) -> SourceState {
        self.lifecycle.state()
    }

    fn is_bounded(&self) -> bool {
        false
    }

    async fn next_event(&mut self) -> SourceEvent {
        if !self.is_producing() {
            return std::future::pending().await;
        }

        tokio::task::yield_now().await;

        if self.lifecycle.is_shutting_down() {
            return self.lifecycle.finished(None);
        }

        let id = self.next_id;
        self.next_id += 1;
        let record = Record::new(id, Payload::Row(self.generator.row(id)));
        self.lifecycle.emit(record)
    }
}
