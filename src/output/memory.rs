use crate::extract::CanonicalProductRecord;
use crate::output::{CrawlReport, OutputResult, ResultSink};
use std::sync::{Mutex, PoisonError};

/// Sink that keeps records in memory, in push order
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CanonicalProductRecord>>,
    report: Mutex<Option<CrawlReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the records pushed so far
    pub fn records(&self) -> Vec<CanonicalProductRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Report passed to `finalize`, if the crawl finished
    pub fn report(&self) -> Option<CrawlReport> {
        self.report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResultSink for MemorySink {
    fn push(&self, record: &CanonicalProductRecord) -> OutputResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn finalize(&self, report: &CrawlReport) -> OutputResult<()> {
        *self.report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        Ok(())
    }
}
