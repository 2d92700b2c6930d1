//! Output module for accepted records and crawl reports
//!
//! This module handles:
//! - The [`ResultSink`] interface the crawl pushes accepted records into
//! - JSON Lines, SQLite and in-memory sinks
//! - The final crawl report and its console rendering

mod jsonl;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use sqlite_output::SqliteSink;
pub use stats::{print_report, CrawlReport};
pub use traits::{OutputError, OutputResult, ResultSink};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;
use std::sync::Arc;

/// Opens the sink selected by the output configuration
///
/// # Arguments
///
/// * `config` - Output path and format
/// * `config_hash` - Hash of the full configuration, stored by SQLite runs
/// * `start_url` - First listing page, stored by SQLite runs
///
/// # Returns
///
/// * `Ok(Arc<dyn ResultSink>)` - Sink ready to receive records
/// * `Err(OutputError)` - The destination could not be opened
pub fn open_sink(
    config: &OutputConfig,
    config_hash: &str,
    start_url: &str,
) -> OutputResult<Arc<dyn ResultSink>> {
    let path = Path::new(&config.path);
    let sink: Arc<dyn ResultSink> = match config.format {
        OutputFormat::Jsonl => Arc::new(JsonLinesSink::create(path)?),
        OutputFormat::Sqlite => Arc::new(SqliteSink::open(path, config_hash, start_url)?),
    };
    tracing::info!("Writing {:?} output to {}", config.format, path.display());
    Ok(sink)
}
