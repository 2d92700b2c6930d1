//! Bounded polling of hydrated page state
//!
//! Listing data is written into the page by client-side scripts some time
//! after the document reports itself loaded. The engine waits a fixed settle
//! delay and then probes the page at a fixed interval until the items appear
//! or the attempt budget runs out.

use crate::config::ExtractionConfig;
use crate::extract::RawProductRecord;
use crate::fetcher::PageHandle;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of delays, injectable so tests never sleep for real
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of one extraction pass over a page
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// At least one item parsed
    Success(Vec<RawProductRecord>),

    /// The items never showed up within the attempt budget
    Empty(String),

    /// Something went wrong that a later visit might not hit
    TransientFailure(String),

    /// Items were present but none could be parsed
    FatalFailure(String),
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Records carried by a successful outcome; empty otherwise
    pub fn records(&self) -> &[RawProductRecord] {
        match self {
            Self::Success(records) => records,
            _ => &[],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Empty(_) => "empty",
            Self::TransientFailure(_) => "transient_failure",
            Self::FatalFailure(_) => "fatal_failure",
        }
    }
}

impl fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(records) => write!(f, "success ({} records)", records.len()),
            Self::Empty(reason) => write!(f, "empty: {}", reason),
            Self::TransientFailure(reason) => write!(f, "transient failure: {}", reason),
            Self::FatalFailure(reason) => write!(f, "fatal failure: {}", reason),
        }
    }
}

/// Polls a page's state for listing items
pub struct ExtractionEngine {
    settle_delay: Duration,
    poll_interval: Duration,
    max_attempts: u32,
    probe_script: String,
    clock: Arc<dyn Clock>,
}

impl ExtractionEngine {
    /// Creates an engine from extraction settings
    ///
    /// # Arguments
    ///
    /// * `config` - Delays, attempt budget and probe expression
    /// * `clock` - Where sleeps are delegated
    pub fn new(config: &ExtractionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            poll_interval: config.poll_interval(),
            max_attempts: config.max_attempts.max(1),
            probe_script: config.probe_script.clone(),
            clock,
        }
    }

    /// Longest time `extract` can spend sleeping
    pub fn max_wait(&self) -> Duration {
        self.settle_delay + self.poll_interval * self.max_attempts
    }

    /// Extracts listing items from a page
    ///
    /// Waits for the document to load and sleeps the settle delay, then
    /// probes up to `max_attempts` times with `poll_interval` before each
    /// probe. The page is never modified.
    pub async fn extract(&self, page: &dyn PageHandle) -> ExtractionOutcome {
        if let Err(e) = page.wait_until_loaded().await {
            return ExtractionOutcome::TransientFailure(format!("page never loaded: {}", e));
        }

        self.clock.sleep(self.settle_delay).await;

        for attempt in 1..=self.max_attempts {
            self.clock.sleep(self.poll_interval).await;

            let value = match page.probe(&self.probe_script).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!("Probe failed on {}: {}", page.url(), e);
                    return ExtractionOutcome::TransientFailure(e.to_string());
                }
            };

            let items = match value {
                Value::Array(items) if !items.is_empty() => items,
                _ => {
                    tracing::trace!(
                        "No items yet on {} (attempt {}/{})",
                        page.url(),
                        attempt,
                        self.max_attempts
                    );
                    continue;
                }
            };

            return parse_items(page.url(), items);
        }

        ExtractionOutcome::Empty(format!(
            "no listing items after {} attempts",
            self.max_attempts
        ))
    }
}

fn parse_items(url: &str, items: Vec<Value>) -> ExtractionOutcome {
    let total = items.len();
    let mut records = Vec::with_capacity(total);

    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawProductRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => tracing::debug!("Skipping item {} on {}: {}", index, url, e),
        }
    }

    if records.is_empty() {
        return ExtractionOutcome::FatalFailure(format!(
            "none of {} listing items could be parsed",
            total
        ));
    }

    ExtractionOutcome::Success(records)
}
