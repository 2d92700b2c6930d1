//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RequestState`: Tracks the lifecycle of individual listing requests
//! - `CrawlState`: Run-wide seen ids and accepted count against the quota
//! - `CrawlTracker`: Shared, mutex-guarded handle to a run's `CrawlState`

mod crawl_state;
mod request_state;

// Re-export main types
pub use crawl_state::{AcceptResult, CrawlProgress, CrawlState, CrawlTracker};
pub use request_state::RequestState;
