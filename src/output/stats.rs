//! Crawl report
//!
//! Counters collected by the coordinator over a run, and a plain-text
//! rendering for the command line.

use std::time::Duration;

/// Final counters of a crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlReport {
    /// Records accepted against the quota
    pub accepted: usize,

    /// Records skipped because their id was already seen (or empty)
    pub duplicates: usize,

    /// The quota the run was bounded by
    pub quota: usize,

    /// Pages whose extraction yielded at least one record
    pub pages_completed: usize,

    /// Pages where no listing items ever appeared
    pub pages_empty: usize,

    /// Pages with transient or fatal extraction failures
    pub pages_failed_extraction: usize,

    /// Requests put back on the queue after a failure
    pub requests_retried: usize,

    /// Requests given up after exhausting retries or failing permanently
    pub requests_abandoned: usize,

    /// Accepted records the sink failed to store
    pub sink_errors: usize,

    /// Whether the run stopped because the quota was met
    pub quota_reached: bool,

    pub elapsed: Duration,
}

impl CrawlReport {
    /// Total number of listing pages that reached a terminal outcome
    pub fn pages_visited(&self) -> usize {
        self.pages_completed + self.pages_empty + self.pages_failed_extraction
    }

    /// Accepted records per second of wall time
    pub fn records_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.accepted as f64 / secs
    }
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `report` - The report to display
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Records:");
    println!("  Accepted: {} / {}", report.accepted, report.quota);
    println!("  Duplicates skipped: {}", report.duplicates);
    if report.sink_errors > 0 {
        println!("  Failed to store: {}", report.sink_errors);
    }
    println!();

    println!("Pages:");
    println!("  With records: {}", report.pages_completed);
    println!("  Empty: {}", report.pages_empty);
    println!("  Extraction failed: {}", report.pages_failed_extraction);
    println!();

    println!("Requests:");
    println!("  Retried: {}", report.requests_retried);
    println!("  Abandoned: {}", report.requests_abandoned);
    println!();

    let stop_reason = if report.quota_reached {
        "quota reached"
    } else {
        "no more pages"
    };
    println!(
        "Finished in {:.1}s ({}), {:.2} records/sec",
        report.elapsed.as_secs_f64(),
        stop_reason,
        report.records_per_second()
    );
}
