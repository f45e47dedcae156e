use engine_config::report::summary::JobReport;
use model::records::record::Record;
use tracing::debug;

/// Optional callbacks invoked synchronously by the controller.
pub trait LoadHooks: Send {
    /// Returning false vetoes loading; the record counts as skipped.
    fn on_read_record(&mut self, _record: &Record) -> bool {
        true
    }

    fn on_record_stored(&mut self, _record: &Record) {}

    fn on_record_error(&mut self, _record: &Record) {}

    fn on_finished(&mut self, _report: &JobReport) {}

    fn on_tick(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NoopHooks;

impl LoadHooks for NoopHooks {}

/// Vetoes rows missing a value for any of the listed fields.
#[derive(Debug, Default)]
pub struct RequiredFields {
    fields: Vec<String>,
    vetoed: u64,
}

impl RequiredFields {
    pub fn new(fields: Vec<String>) -> Self {
        RequiredFields { fields, vetoed: 0 }
    }

    pub fn vetoed(&self) -> u64 {
        self.vetoed
    }
}

impl LoadHooks for RequiredFields {
    fn on_read_record(&mut self, record: &Record) -> bool {
        let Some(row) = record.row() else {
            return true;
        };

        if let Some(missing) = self.fields.iter().find(|f| row.get_value(f).is_null()) {
            self.vetoed += 1;
            debug!(record_id = record.id, field = %missing, "Vetoed row with missing field");
            return false;
        }
        true
    }

    fn on_finished(&mut self, report: &JobReport) {
        if self.vetoed > 0 {
            tracing::info!(job = %report.job_name, vetoed = self.vetoed, "Rows vetoed for missing fields");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::value::{FieldValue, Value},
        records::{record::Payload, row::RowData},
    };

    fn record(email: Value) -> Record {
        let row = RowData::new(
            "users",
            "1",
            vec![
                FieldValue::new("id", Value::Int(1)),
                FieldValue::new("email", email),
            ],
        );
        Record::new(0, Payload::Row(row))
    }

    #[test]
    fn test_noop_accepts_everything() {
        let mut hooks = NoopHooks;
        assert!(hooks.on_read_record(&record(Value::Null)));
    }

    #[test]
    fn test_required_fields_veto() {
        let mut hooks = RequiredFields::new(vec!["email".to_string()]);
        assert!(hooks.on_read_record(&record(Value::String("a@b.c".into()))));
        assert!(!hooks.on_read_record(&record(Value::Null)));
        assert_eq!(hooks.vetoed(), 1);
    }

    #[test]
    fn test_required_fields_ignores_raw_payloads() {
        let mut hooks = RequiredFields::new(vec!["email".to_string()]);
        let raw = Record::new(0, Payload::Raw("x".to_string()));
        assert!(hooks.on_read_record(&raw));
    }
}
