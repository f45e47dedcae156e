use engine_config::settings::spec::BadRecordFormat;
use model::{
    execution::failed_row::FailedRow,
    records::record::{Payload, Record},
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
};
use tracing::debug;

#[derive(Error, Debug)]
pub enum FailedRowWriterError {
    #[error("Failed to write to file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize failed row: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Appends failed records to a side file, in arrival order.
pub struct FailedRowWriter {
    path: PathBuf,
    format: BadRecordFormat,
    job_name: String,
    out: BufWriter<File>,
    written: u64,
}

impl FailedRowWriter {
    pub async fn open(
        path: impl AsRef<Path>,
        format: BadRecordFormat,
        job_name: &str,
    ) -> Result<Self, FailedRowWriterError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(FailedRowWriter {
            path,
            format,
            job_name: job_name.to_string(),
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, record: &Record) -> Result<(), FailedRowWriterError> {
        let line = match self.format {
            BadRecordFormat::Json => {
                let failed_row = FailedRow::from_record(&self.job_name, record);
                serde_json::to_string(&failed_row)?
            }
            BadRecordFormat::Raw => raw_line(record),
        };

        self.out.write_all(line.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.written += 1;
        debug!(record_id = record.id, path = %self.path.display(), "Wrote failed record");
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), FailedRowWriterError> {
        self.out.flush().await?;
        self.out.get_mut().sync_data().await?;
        Ok(())
    }
}

/// The original source line, or the row's values joined by commas.
fn raw_line(record: &Record) -> String {
    if let Some(line) = record.raw_line() {
        return line.to_string();
    }
    match &record.payload {
        Payload::Row(row) => row
            .field_values
            .iter()
            .map(|f| f.value.to_string())
            .collect::<Vec<_>>()
            .join(","),
        Payload::Raw(line) => line.clone(),
    }
}
