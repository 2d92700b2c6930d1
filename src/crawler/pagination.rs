//! Next-page decisions
//!
//! The listing exposes no reliable "last page" marker, so the default policy
//! keeps walking forward while pages keep yielding records. This costs one
//! extra request past the last page and stops early if a page in the middle
//! comes back empty.

use crate::crawler::CrawlRequest;
use crate::extract::ExtractionOutcome;
use crate::state::CrawlProgress;
use crate::url::ListingUrlBuilder;

/// Decides which request, if any, follows a handled page
pub trait PaginationPolicy: Send + Sync {
    /// Returns the request for the page after `current`
    ///
    /// # Arguments
    ///
    /// * `current` - The request that was just handled
    /// * `outcome` - What extraction found on that page
    /// * `progress` - Quota progress after the page's records were offered
    fn next_request(
        &self,
        current: &CrawlRequest,
        outcome: &ExtractionOutcome,
        progress: CrawlProgress,
    ) -> Option<CrawlRequest>;
}

/// Follows `page + 1` after every page that yielded records
#[derive(Debug, Clone)]
pub struct HeuristicPagination {
    urls: ListingUrlBuilder,
}

impl HeuristicPagination {
    /// Creates a policy building page URLs with `urls`
    pub fn new(urls: ListingUrlBuilder) -> Self {
        Self { urls }
    }
}

impl PaginationPolicy for HeuristicPagination {
    fn next_request(
        &self,
        current: &CrawlRequest,
        outcome: &ExtractionOutcome,
        progress: CrawlProgress,
    ) -> Option<CrawlRequest> {
        if progress.is_satisfied() {
            return None;
        }

        match outcome {
            ExtractionOutcome::Success(records) if !records.is_empty() => {
                let page_number = current.page_number.saturating_add(1);
                Some(CrawlRequest::new(self.urls.build(page_number), page_number))
            }
            _ => None,
        }
    }
}
