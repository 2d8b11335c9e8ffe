use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::{CollectorError, Result};

/// CSV sink with a fixed header, flushed after every row so an aborted
/// run keeps what it already wrote.
pub struct RecordWriter<W: Write> {
    inner: csv::Writer<W>,
    rows: u64,
}

impl RecordWriter<File> {
    /// Create (or truncate) `path`, making parent directories as needed.
    pub fn create(path: &Path, header: &[&str]) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::new(File::create(path)?, header)
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W, header: &[&str]) -> Result<Self> {
        let mut inner = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::CRLF)
            .from_writer(sink);
        inner.write_record(header)?;
        inner.flush()?;
        Ok(Self { inner, rows: 0 })
    }

    pub fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.inner.serialize(row)?;
        self.inner.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far, header excluded.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    #[cfg(test)]
    pub fn into_inner(self) -> Result<W> {
        self.inner.into_inner().map_err(|e| {
            CollectorError::Io(io::Error::new(e.error().kind(), e.error().to_string()))
        })
    }
}
