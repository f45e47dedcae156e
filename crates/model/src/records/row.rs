use crate::core::value::{FieldValue, Value};
use serde::{Deserialize, Serialize};

/// A shaped, typed row ready to be written to a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RowData {
    pub entity: String,
    pub key: String,
    pub field_values: Vec<FieldValue>,
}

impl RowData {
    pub fn new(entity: &str, key: impl Into<String>, field_values: Vec<FieldValue>) -> Self {
        RowData {
            entity: entity.to_string(),
            key: key.into(),
            field_values,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.field_values
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(field))
    }

    pub fn get_value(&self, field: &str) -> Value {
        self.get(field)
            .map(|f| f.value.clone())
            .unwrap_or(Value::Null)
    }

    /// Storage key, namespaced by entity.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.entity, self.key)
    }

    pub fn size_bytes(&self) -> usize {
        self.field_values
            .iter()
            .map(|f| f.name.len() + f.value.size_bytes())
            .sum()
    }
}
