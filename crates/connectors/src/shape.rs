use crate::error::ShapeError;
use model::{
    core::value::{FieldValue, Value},
    records::{
        record::{Payload, Record, SourceSpan},
        row::RowData,
    },
};

/// Turns raw source records into typed rows.
pub trait RecordShaper: Send {
    /// Replaces a raw payload with a typed row. Already-typed payloads pass through.
    fn shape(&mut self, record: &mut Record) -> Result<(), ShapeError>;

    /// Learns column names from a header record.
    fn discover_columns(&mut self, record: &Record) -> Result<(), ShapeError>;
}

/// Shapes delimited text lines, inferring a scalar type for every cell.
pub struct DelimitedShaper {
    entity: String,
    delimiter: u8,
    columns: Option<Vec<String>>,
    key_column: Option<String>,
}

impl DelimitedShaper {
    pub fn new(entity: &str, delimiter: u8) -> Self {
        DelimitedShaper {
            entity: entity.to_string(),
            delimiter,
            columns: None,
            key_column: None,
        }
    }

    pub fn with_key_column(mut self, key_column: Option<String>) -> Self {
        self.key_column = key_column;
        self
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    fn split(&self, line: &str) -> Result<Vec<String>, ShapeError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.delimiter)
            .flexible(true)
            .from_reader(line.as_bytes());

        let mut record = csv::StringRecord::new();
        match reader.read_record(&mut record) {
            Ok(true) => Ok(record.iter().map(str::to_string).collect()),
            Ok(false) => Err(ShapeError::Empty),
            Err(e) => Err(ShapeError::Malformed(e.to_string())),
        }
    }

    fn key_index(&self, names: &[String]) -> Result<usize, ShapeError> {
        match &self.key_column {
            None => Ok(0),
            Some(key) => names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(key))
                .ok_or_else(|| ShapeError::MissingKey(key.clone())),
        }
    }
}

pub fn normalize_col_name(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(' ', "_")
}

impl RecordShaper for DelimitedShaper {
    fn shape(&mut self, record: &mut Record) -> Result<(), ShapeError> {
        let line = match &record.payload {
            Payload::Row(_) => return Ok(()),
            Payload::Raw(line) => line.clone(),
        };

        let cells = self.split(&line)?;
        let names: Vec<String> = match &self.columns {
            Some(columns) => {
                if columns.len() != cells.len() {
                    return Err(ShapeError::ColumnCount {
                        expected: columns.len(),
                        found: cells.len(),
                    });
                }
                columns.clone()
            }
            None => (1..=cells.len()).map(|i| format!("col_{i}")).collect(),
        };

        let key_idx = self.key_index(&names)?;
        let key = cells
            .get(key_idx)
            .map(|c| c.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ShapeError::MissingKey(names[key_idx].clone()))?;

        let fields = names
            .into_iter()
            .zip(cells.iter())
            .map(|(name, cell)| FieldValue::new(name, Value::infer(cell)))
            .collect();

        if record.span.is_none() {
            record.span = Some(SourceSpan {
                offset: 0,
                length: line.len() as u64,
                line: Some(line),
            });
        }
        record.payload = Payload::Row(RowData::new(&self.entity, key, fields));
        Ok(())
    }

    fn discover_columns(&mut self, record: &Record) -> Result<(), ShapeError> {
        let line = record.raw_line().ok_or(ShapeError::Empty)?;
        let columns: Vec<String> = self
            .split(line)?
            .iter()
            .map(|c| normalize_col_name(c))
            .collect();
        self.key_index(&columns)?;
        self.columns = Some(columns);
        Ok(())
    }
}
