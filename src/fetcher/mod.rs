//! Page loading
//!
//! This module provides the transport side of a crawl:
//! - the [`Fetcher`] and [`PageHandle`] interfaces the crawl core drives
//! - a pool of reusable sessions with usage ceilings
//! - a block list for analytics and tracking requests
//! - an HTTP fetcher that answers probes from a page's inline state

mod blocklist;
mod http;
mod probe;
mod session;
mod traits;

pub use blocklist::BlockList;
pub use http::{build_http_client, HttpFetcher, HttpPage};
pub use probe::{find_global_assignment, ProbePath};
pub use session::{Session, SessionLease, SessionPool};
pub use traits::{FetchError, Fetcher, PageHandle, ProbeError};
