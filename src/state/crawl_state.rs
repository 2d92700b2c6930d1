use crate::extract::CanonicalProductRecord;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of offering a record to the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptResult {
    /// Record is new and counted against the quota
    Accepted,

    /// Record id was already seen in this run (or is empty)
    DuplicateSkipped,

    /// Quota is already met; the record was not inspected
    QuotaReached,
}

/// Run-wide deduplication and quota state
///
/// Invariant: `accepted_count == seen_ids.len()` and never exceeds `quota`.
#[derive(Debug, Clone)]
pub struct CrawlState {
    seen_ids: HashSet<String>,
    accepted_count: usize,
    quota: usize,
    duplicates: usize,
}

impl CrawlState {
    pub fn new(quota: usize) -> Self {
        Self {
            seen_ids: HashSet::new(),
            accepted_count: 0,
            quota,
            duplicates: 0,
        }
    }

    /// Offers a record for acceptance
    ///
    /// The quota check comes first so that a satisfied run never touches
    /// the seen set again.
    pub fn accept(&mut self, record: &CanonicalProductRecord) -> AcceptResult {
        if self.accepted_count >= self.quota {
            return AcceptResult::QuotaReached;
        }

        if record.product_id.is_empty() || !self.seen_ids.insert(record.product_id.clone()) {
            self.duplicates += 1;
            return AcceptResult::DuplicateSkipped;
        }

        self.accepted_count += 1;
        AcceptResult::Accepted
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted_count
    }

    pub fn quota(&self) -> usize {
        self.quota
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn is_satisfied(&self) -> bool {
        self.accepted_count >= self.quota
    }

    pub fn has_seen(&self, product_id: &str) -> bool {
        self.seen_ids.contains(product_id)
    }

    pub fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            accepted: self.accepted_count,
            quota: self.quota,
        }
    }
}

/// Point-in-time view of the quota, handed to pagination policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlProgress {
    pub accepted: usize,
    pub quota: usize,
}

impl CrawlProgress {
    pub fn is_satisfied(&self) -> bool {
        self.accepted >= self.quota
    }

    pub fn remaining(&self) -> usize {
        self.quota.saturating_sub(self.accepted)
    }
}

/// Shared handle to a run's [`CrawlState`]
///
/// All workers go through this single mutex, which serializes acceptance.
#[derive(Debug, Clone)]
pub struct CrawlTracker {
    inner: Arc<Mutex<CrawlState>>,
}

impl CrawlTracker {
    pub fn new(quota: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CrawlState::new(quota))),
        }
    }

    /// Offers a record for acceptance, see [`CrawlState::accept`]
    pub fn accept(&self, record: &CanonicalProductRecord) -> AcceptResult {
        self.lock().accept(record)
    }

    pub fn progress(&self) -> CrawlProgress {
        self.lock().progress()
    }

    pub fn is_satisfied(&self) -> bool {
        self.lock().is_satisfied()
    }

    pub fn accepted_count(&self) -> usize {
        self.lock().accepted_count()
    }

    pub fn duplicates(&self) -> usize {
        self.lock().duplicates()
    }

    // Acceptance never panics while holding the lock, so a poisoned state is
    // still consistent.
    fn lock(&self) -> MutexGuard<'_, CrawlState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
