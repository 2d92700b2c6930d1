//! Result sink trait and output errors
//!
//! A sink receives every accepted product record as soon as it is accepted,
//! and the final report once the crawl has drained.

use crate::extract::CanonicalProductRecord;
use crate::output::CrawlReport;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for accepted product records
///
/// Sinks are shared by all crawl workers, so implementations must be
/// thread-safe. A failed push does not un-accept the record.
pub trait ResultSink: Send + Sync {
    /// Stores one accepted record
    ///
    /// # Arguments
    ///
    /// * `record` - The record, already deduplicated and counted
    fn push(&self, record: &CanonicalProductRecord) -> OutputResult<()>;

    /// Flushes buffered output and records the final report
    ///
    /// # Arguments
    ///
    /// * `report` - Counters of the finished crawl
    fn finalize(&self, _report: &CrawlReport) -> OutputResult<()> {
        Ok(())
    }
}
