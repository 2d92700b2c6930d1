//! Crawler module for listing traversal
//!
//! This module contains the core crawling logic, including:
//! - Request queueing and concurrency limiting
//! - Next-page decisions
//! - Overall crawl coordination with retries and quota cancellation

mod coordinator;
mod pagination;
mod scheduler;

pub use coordinator::Coordinator;
pub use pagination::{HeuristicPagination, PaginationPolicy};
pub use scheduler::{QueuedRequest, ScheduledRequest, Scheduler};

use crate::config::{validate, Config};
use crate::fetcher::HttpFetcher;
use crate::output::{open_sink, CrawlReport};
use crate::url::page_number_from_url;
use crate::HarvestError;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One listing page to visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Fully built page URL, filters and page parameter included
    pub url: Url,

    /// 1-based page number
    pub page_number: u32,
}

impl CrawlRequest {
    pub fn new(url: Url, page_number: u32) -> Self {
        Self {
            url,
            page_number: page_number.max(1),
        }
    }

    /// Request for a URL, numbered after its `page` parameter
    pub fn from_url(url: Url) -> Self {
        let page_number = page_number_from_url(&url);
        Self::new(url, page_number)
    }
}

impl fmt::Display for CrawlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {} ({})", self.page_number, self.url)
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and open the configured output
/// 2. Build the HTTP fetcher and session pool
/// 3. Seed the queue with the start page
/// 4. Fetch pages and extract their listing items
/// 5. Push accepted records to the sink until the quota is met
/// 6. Return the run's report
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash recorded with the run by sinks that keep run metadata
/// * `cancel` - Stops dispatching when cancelled; also cancelled on quota
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl finished
/// * `Err(HarvestError)` - Crawl could not be set up
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<CrawlReport, HarvestError> {
    validate(config)?;
    let sink = open_sink(&config.output, config_hash, &config.input.start_url)?;

    let fetcher = Arc::new(HttpFetcher::new(
        &config.fetcher,
        config.crawler.navigation_timeout(),
    ));
    let coordinator = Coordinator::new(config, fetcher, sink)?.with_cancellation(cancel);
    let seed = coordinator.seed_request();
    coordinator.run(seed).await
}
