//! JSON Lines output
//!
//! Each accepted record becomes one JSON object on its own line, written as
//! soon as it is accepted so a crashed run still leaves usable output.

use crate::extract::CanonicalProductRecord;
use crate::output::{CrawlReport, OutputResult, ResultSink};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Sink writing one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) the output file
    ///
    /// # Arguments
    ///
    /// * `path` - Destination file
    ///
    /// # Returns
    ///
    /// * `Ok(JsonLinesSink)` - File opened for writing
    /// * `Err(OutputError)` - The file could not be created
    pub fn create(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink and returns the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ResultSink for JsonLinesSink<W> {
    fn push(&self, record: &CanonicalProductRecord) -> OutputResult<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn finalize(&self, report: &CrawlReport) -> OutputResult<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        tracing::debug!("Flushed {} records to JSON Lines output", report.accepted);
        Ok(())
    }
}
