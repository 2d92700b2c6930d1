//! Request queue and dispatch permits
//!
//! This module handles:
//! - FIFO ordering of pending listing requests
//! - Global concurrency limiting via a semaphore
//! - Per-request retry counters and state transitions

use crate::crawler::CrawlRequest;
use crate::state::RequestState;
use crate::HarvestError;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A request waiting in (or dispatched from) the queue
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    /// The listing page to visit
    pub request: CrawlRequest,

    /// Failed attempts so far
    pub retries: u32,

    state: RequestState,
}

impl QueuedRequest {
    pub fn new(request: CrawlRequest) -> Self {
        Self {
            request,
            retries: 0,
            state: RequestState::Queued,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Moves the request to `next`, rejecting transitions the state machine forbids
    pub fn transition(&mut self, next: RequestState) -> Result<(), HarvestError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }
}

/// A dispatched request holding one concurrency permit
pub struct ScheduledRequest {
    /// The request to handle
    pub queued: QueuedRequest,

    /// Released when the worker handling the request finishes
    pub _permit: OwnedSemaphorePermit,
}

/// Scheduler owns the request queue and the concurrency limit
pub struct Scheduler {
    /// Global semaphore for limiting concurrent requests
    semaphore: Arc<Semaphore>,

    /// Pending requests, oldest first
    queue: VecDeque<QueuedRequest>,

    max_concurrency: usize,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `max_concurrency` - Maximum number of requests in flight
    /// * `initial` - Requests to start from
    pub fn new(max_concurrency: usize, initial: Vec<CrawlRequest>) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            queue: initial.into_iter().map(QueuedRequest::new).collect(),
            max_concurrency,
        }
    }

    /// Takes the oldest queued request if a concurrency slot is free
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ScheduledRequest))` - A request now in flight
    /// * `Ok(None)` - The queue is empty or every slot is taken
    pub fn try_next(&mut self) -> Result<Option<ScheduledRequest>, HarvestError> {
        if self.queue.is_empty() {
            return Ok(None);
        }

        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            return Ok(None);
        };

        let Some(mut queued) = self.queue.pop_front() else {
            return Ok(None);
        };
        queued.transition(RequestState::InFlight)?;

        tracing::debug!(
            "Dispatching page {}: {}",
            queued.request.page_number,
            queued.request.url
        );

        Ok(Some(ScheduledRequest {
            queued,
            _permit: permit,
        }))
    }

    /// Adds a new request at the back of the queue
    pub fn enqueue(&mut self, request: CrawlRequest) {
        self.queue.push_back(QueuedRequest::new(request));
    }

    /// Puts a retrying request back at the end of the queue
    pub fn requeue(&mut self, mut queued: QueuedRequest) -> Result<(), HarvestError> {
        queued.transition(RequestState::Queued)?;
        self.queue.push_back(queued);
        Ok(())
    }

    /// Drops every pending request, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }

    /// Returns the number of pending requests
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of requests currently holding a permit
    pub fn in_flight(&self) -> usize {
        self.max_concurrency - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(page: u32) -> CrawlRequest {
        let url = Url::parse(&format!("https://shop.example.com/items?page={}", page)).unwrap();
        CrawlRequest::new(url, page)
    }

    #[test]
    fn test_new_scheduler() {
        let scheduler = Scheduler::new(3, vec![]);
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[test]
    fn test_fifo_order() {
        let mut scheduler = Scheduler::new(3, vec![request(1)]);
        scheduler.enqueue(request(2));
        scheduler.enqueue(request(3));

        let first = scheduler.try_next().unwrap().unwrap();
        let second = scheduler.try_next().unwrap().unwrap();

        assert_eq!(first.queued.request.page_number, 1);
        assert_eq!(second.queued.request.page_number, 2);
        assert_eq!(first.queued.state(), RequestState::InFlight);
        assert_eq!(scheduler.queue_len(), 1);
    }

    #[test]
    fn test_permits_bound_dispatch() {
        let mut scheduler = Scheduler::new(1, vec![request(1), request(2)]);

        let held = scheduler.try_next().unwrap();
        assert!(held.is_some());
        assert_eq!(scheduler.in_flight(), 1);
        assert!(scheduler.try_next().unwrap().is_none());

        drop(held);
        assert_eq!(scheduler.in_flight(), 0);
        assert!(scheduler.try_next().unwrap().is_some());
    }

    #[test]
    fn test_requeue_after_retry() {
        let mut scheduler = Scheduler::new(1, vec![request(1)]);
        let scheduled = scheduler.try_next().unwrap().unwrap();

        let mut queued = scheduled.queued;
        queued.retries += 1;
        queued.transition(RequestState::Retrying).unwrap();
        drop(scheduled._permit);
        scheduler.requeue(queued).unwrap();

        let again = scheduler.try_next().unwrap().unwrap();
        assert_eq!(again.queued.retries, 1);
        assert_eq!(again.queued.request.page_number, 1);
    }

    #[test]
    fn test_requeue_requires_retrying_state() {
        let mut scheduler = Scheduler::new(1, vec![]);
        let queued = QueuedRequest::new(request(1));
        assert!(scheduler.requeue(queued).is_err());
    }

    #[test]
    fn test_clear() {
        let mut scheduler = Scheduler::new(2, vec![request(1), request(2)]);
        assert_eq!(scheduler.clear(), 2);
        assert!(scheduler.try_next().unwrap().is_none());
    }
}
