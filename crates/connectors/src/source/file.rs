use super::{DataSource, SourceEvent, SourceLifecycle, SourceState};
use crate::error::SourceError;
use async_trait::async_trait;
use model::records::record::{Payload, Record, SourceSpan};
use std::{collections::VecDeque, path::Path};
use tokio::{fs::File, io::AsyncReadExt};
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A line-oriented file reader that pulls fixed-size chunks.
///
/// A trailing partial line is carried over into the scan buffer before the
/// next chunk is read, so a record never straddles two reads. Blank lines are
/// not input units and are dropped.
pub struct FileSource {
    lifecycle: SourceLifecycle,
    path: String,
    file: File,
    chunk: Vec<u8>,
    /// Bytes read but not yet terminated by a newline.
    carry: Vec<u8>,
    /// File offset of the first byte in `carry`.
    carry_offset: u64,
    lines: VecDeque<(u64, Vec<u8>)>,
    eof: bool,
    next_id: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, SourceError> {
        let display = path.as_ref().display().to_string();
        if chunk_size == 0 {
            return Err(SourceError::InvalidChunkSize(chunk_size));
        }

        let file = File::open(path.as_ref())
            .await
            .map_err(|e| SourceError::from_open(&display, e))?;

        Ok(FileSource {
            lifecycle: SourceLifecycle::new(),
            path: display,
            file,
            chunk: vec![0; chunk_size],
            carry: Vec::new(),
            carry_offset: 0,
            lines: VecDeque::new(),
            eof: false,
            next_id: 0,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Moves every complete line of the scan buffer into the line queue.
    fn scan(&mut self) {
        let mut start = 0;
        while let Some(pos) = self.carry[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            let line = self.carry[start..end].to_vec();
            self.lines
                .push_back((self.carry_offset + start as u64, line));
            start = end + 1;
        }

        if start > 0 {
            self.carry.drain(..start);
            self.carry_offset += start as u64;
        }
    }

    fn take_line(&mut self) -> Option<Record> {
        while let Some((offset, mut bytes)) = self.lines.pop_front() {
            let length = bytes.len() as u64;
            if bytes.last() == Some(&b'\r') {
                bytes.pop();
            }
            if bytes.is_empty() {
                continue;
            }

            let text = String::from_utf8_lossy(&bytes).into_owned();
            let id = self.next_id;
            self.next_id += 1;
            let record = Record::new(id, Payload::Raw(text.clone())).with_span(SourceSpan {
                offset,
                length,
                line: Some(text),
            });
            return Some(record);
        }
        None
    }
}

#[async_trait]
impl DataSource for FileSource {
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
        true
    }

    async fn next_event(&mut self) -> SourceEvent {
        if !self.is_producing() {
            return std::future::pending().await;
        }

        loop {
            if self.lifecycle.is_shutting_down() {
                return self.lifecycle.finished(None);
            }

            if let Some(record) = self.take_line() {
                return self.lifecycle.emit(record);
            }

            if self.eof {
                if !self.carry.is_empty() {
                    let rest = std::mem::take(&mut self.carry);
                    self.lines.push_back((self.carry_offset, rest));
                    continue;
                }
                debug!(path = %self.path, records = self.next_id, "Reached end of file");
                return self.lifecycle.finished(None);
            }

            match self.file.read(&mut self.chunk).await {
                Ok(0) => self.eof = true,
                Ok(n) => {
                    self.carry.extend_from_slice(&self.chunk[..n]);
                    self.scan();
                }
                Err(e) => return self.lifecycle.finished(Some(SourceError::Io(e))),
            }
        }
    }
}
