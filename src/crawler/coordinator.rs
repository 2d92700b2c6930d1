//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Dispatching queued listing requests to a bounded set of workers
//! - Fetching, extracting, normalizing and accepting records per page
//! - Retrying failed fetches and abandoning exhausted requests
//! - Stopping dispatch once the quota is met

use crate::config::Config;
use crate::crawler::pagination::{HeuristicPagination, PaginationPolicy};
use crate::crawler::scheduler::{QueuedRequest, ScheduledRequest, Scheduler};
use crate::crawler::CrawlRequest;
use crate::extract::{ExtractionEngine, ExtractionOutcome, Normalizer, TokioClock};
use crate::fetcher::{FetchError, Fetcher, SessionPool};
use crate::output::{CrawlReport, ResultSink};
use crate::state::{AcceptResult, CrawlTracker, RequestState};
use crate::url::{page_number_from_url, parse_listing_url, site_origin, ListingUrlBuilder};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What one handled page contributed to the run
#[derive(Debug)]
struct PageResult {
    outcome: ExtractionOutcome,
    accepted: usize,
    sink_errors: usize,
    next: Option<CrawlRequest>,
}

/// Everything a worker needs to handle one request
struct PageHandler {
    fetcher: Arc<dyn Fetcher>,
    sessions: SessionPool,
    engine: ExtractionEngine,
    normalizer: Normalizer,
    tracker: CrawlTracker,
    pagination: Arc<dyn PaginationPolicy>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
    navigation_timeout: Duration,
}

impl PageHandler {
    /// Runs one request's pipeline
    ///
    /// Fetch-level failures are returned for the retry policy; extraction
    /// problems are part of a successful result.
    async fn handle(&self, request: &CrawlRequest) -> std::result::Result<PageResult, FetchError> {
        let lease = self.sessions.acquire().await?;

        let navigation = tokio::time::timeout(
            self.navigation_timeout,
            self.fetcher.navigate(lease.session(), &request.url),
        )
        .await;

        let page = match navigation {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => {
                lease.release(false);
                return Err(e);
            }
            Err(_) => {
                lease.release(false);
                return Err(FetchError::Timeout {
                    url: request.url.to_string(),
                    after: self.navigation_timeout,
                });
            }
        };

        let outcome = self.engine.extract(page.as_ref()).await;
        lease.release(!matches!(outcome, ExtractionOutcome::TransientFailure(_)));

        let mut accepted = 0;
        let mut sink_errors = 0;

        for raw in outcome.records() {
            let record = self.normalizer.normalize(raw);
            match self.tracker.accept(&record) {
                AcceptResult::Accepted => {
                    accepted += 1;
                    if let Err(e) = self.sink.push(&record) {
                        tracing::error!("Failed to store product {}: {}", record.product_id, e);
                        sink_errors += 1;
                    }
                }
                AcceptResult::DuplicateSkipped => {
                    tracing::debug!("Skipping duplicate product '{}'", record.product_id);
                }
                AcceptResult::QuotaReached => break,
            }
        }

        match &outcome {
            ExtractionOutcome::Success(records) => tracing::debug!(
                "Page {}: {} records, {} accepted",
                request.page_number,
                records.len(),
                accepted
            ),
            ExtractionOutcome::Empty(reason) => {
                tracing::warn!("Page {} is empty ({}): {}", request.page_number, reason, request.url)
            }
            ExtractionOutcome::TransientFailure(reason) => {
                tracing::debug!("Extraction failed on page {}: {}", request.page_number, reason)
            }
            ExtractionOutcome::FatalFailure(reason) => {
                tracing::error!("Extraction failed on page {}: {}", request.page_number, reason)
            }
        }

        let progress = self.tracker.progress();
        if progress.is_satisfied() && !self.cancel.is_cancelled() {
            tracing::info!("Quota of {} products reached, stopping", progress.quota);
            self.cancel.cancel();
        }

        let next = self.pagination.next_request(request, &outcome, progress);

        Ok(PageResult {
            outcome,
            accepted,
            sink_errors,
            next,
        })
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    handler: PageHandler,
    urls: ListingUrlBuilder,
    max_concurrency: usize,
    max_request_retries: u32,
    handler_timeout: Duration,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// The extraction engine sleeps on the tokio timer and pagination uses
    /// [`HeuristicPagination`]; both can be replaced before running.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Page-loading transport
    /// * `sink` - Destination of accepted records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - The start URL or site origin is invalid
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ResultSink>) -> Result<Self> {
        let start_url = parse_listing_url(&config.input.start_url)?;
        let origin = match &config.input.site_origin {
            Some(origin) => parse_listing_url(origin)?,
            None => site_origin(&start_url),
        };

        let urls = ListingUrlBuilder::new(start_url)
            .with_price_range(config.input.min_price, config.input.max_price)
            .with_sort(config.input.sort_by.clone());

        let handler = PageHandler {
            fetcher,
            sessions: SessionPool::new(&config.session, &config.input.proxy),
            engine: ExtractionEngine::new(&config.extraction, Arc::new(TokioClock)),
            normalizer: Normalizer::new(origin),
            tracker: CrawlTracker::new(config.input.results_wanted),
            pagination: Arc::new(HeuristicPagination::new(urls.clone())),
            sink,
            cancel: CancellationToken::new(),
            navigation_timeout: config.crawler.navigation_timeout(),
        };

        Ok(Self {
            handler,
            urls,
            max_concurrency: config.crawler.max_concurrency as usize,
            max_request_retries: config.crawler.max_request_retries,
            handler_timeout: config.crawler.handler_timeout(),
        })
    }

    /// Replaces the extraction engine
    pub fn with_engine(mut self, engine: ExtractionEngine) -> Self {
        self.handler.engine = engine;
        self
    }

    /// Replaces the pagination policy
    pub fn with_pagination(mut self, pagination: Arc<dyn PaginationPolicy>) -> Self {
        self.handler.pagination = pagination;
        self
    }

    /// Replaces the dedup and quota tracker
    ///
    /// The tracker is a shared handle, so a clone kept by the caller sees
    /// the run's progress.
    pub fn with_tracker(mut self, tracker: CrawlTracker) -> Self {
        self.handler.tracker = tracker;
        self
    }

    /// Replaces the cancellation token, e.g. with one wired to a signal
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.handler.cancel = cancel;
        self
    }

    /// The first request of the run
    ///
    /// Carries the configured filters, and the page number of the start
    /// URL's `page` parameter.
    pub fn seed_request(&self) -> CrawlRequest {
        let page_number = page_number_from_url(self.urls.base());
        CrawlRequest::new(self.urls.build(page_number), page_number)
    }

    /// Token cancelled when the quota is met; cancel it to stop dispatching
    pub fn cancellation_token(&self) -> CancellationToken {
        self.handler.cancel.clone()
    }

    /// Handle on the session pool the run leases from
    pub fn session_pool(&self) -> SessionPool {
        self.handler.sessions.clone()
    }

    pub fn tracker(&self) -> &CrawlTracker {
        &self.handler.tracker
    }

    /// Runs the main crawl loop
    ///
    /// This is the core crawling logic that:
    /// 1. Dispatches queued requests while permits are free and the run is
    ///    not cancelled
    /// 2. Collects finished workers
    /// 3. Re-queues failed requests until their retries run out
    /// 4. Enqueues the next page chosen by the pagination policy
    ///
    /// Returns once nothing is queued or in flight. After cancellation the
    /// queue is dropped and in-flight requests are drained.
    pub async fn run(self, seed: CrawlRequest) -> Result<CrawlReport> {
        tracing::info!(
            "Starting crawl at {} (quota: {})",
            seed.url,
            self.handler.tracker.progress().quota
        );

        let run_loop = RunLoop {
            handler: Arc::new(self.handler),
            max_request_retries: self.max_request_retries,
            handler_timeout: self.handler_timeout,
        };
        run_loop
            .run(Scheduler::new(self.max_concurrency, vec![seed]))
            .await
    }
}

type WorkerOutput = (QueuedRequest, std::result::Result<PageResult, FetchError>);

/// State of a running crawl, shared by the dispatch loop only
struct RunLoop {
    handler: Arc<PageHandler>,
    max_request_retries: u32,
    handler_timeout: Duration,
}

impl RunLoop {
    async fn run(&self, mut scheduler: Scheduler) -> Result<CrawlReport> {
        let start_time = Instant::now();
        let mut workers: JoinSet<WorkerOutput> = JoinSet::new();
        let mut report = CrawlReport::default();

        loop {
            if self.handler.cancel.is_cancelled() {
                let dropped = scheduler.clear();
                if dropped > 0 {
                    tracing::info!("Dropping {} queued requests", dropped);
                }
            } else {
                while let Some(scheduled) = scheduler.try_next()? {
                    self.spawn_worker(&mut workers, scheduled);
                }
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };

            let (mut queued, result) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    tracing::error!("Worker task failed: {}", e);
                    report.requests_abandoned += 1;
                    continue;
                }
            };

            match result {
                Ok(page) => {
                    queued.transition(RequestState::Completed)?;
                    record_page(&mut report, &page);

                    if let Some(next) = page.next {
                        if self.handler.cancel.is_cancelled() {
                            tracing::debug!("Not following page {}: crawl stopping", next.page_number);
                        } else {
                            scheduler.enqueue(next);
                        }
                    }
                }
                Err(e) => self.handle_failure(&mut scheduler, &mut report, queued, e)?,
            }

            let progress = self.handler.tracker.progress();
            tracing::info!(
                "Progress: {}/{} products, {} queued, {} in flight",
                progress.accepted,
                progress.quota,
                scheduler.queue_len(),
                workers.len()
            );
        }

        let tracker = &self.handler.tracker;
        report.accepted = tracker.accepted_count();
        report.duplicates = tracker.duplicates();
        report.quota = tracker.progress().quota;
        report.quota_reached = tracker.is_satisfied();
        report.elapsed = start_time.elapsed();

        if let Err(e) = self.handler.sink.finalize(&report) {
            tracing::error!("Failed to finalize output: {}", e);
            report.sink_errors += 1;
        }

        tracing::info!(
            "Crawl completed: {} products in {:?}",
            report.accepted,
            report.elapsed
        );

        Ok(report)
    }

    fn spawn_worker(&self, workers: &mut JoinSet<WorkerOutput>, scheduled: ScheduledRequest) {
        let handler = Arc::clone(&self.handler);
        let handler_timeout = self.handler_timeout;

        workers.spawn(async move {
            let ScheduledRequest { queued, _permit } = scheduled;
            let result =
                match tokio::time::timeout(handler_timeout, handler.handle(&queued.request)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        url: queued.request.url.to_string(),
                        after: handler_timeout,
                    }),
                };
            drop(_permit);
            (queued, result)
        });
    }

    /// Applies the retry policy to a failed request
    fn handle_failure(
        &self,
        scheduler: &mut Scheduler,
        report: &mut CrawlReport,
        mut queued: QueuedRequest,
        error: FetchError,
    ) -> Result<()> {
        let url = queued.request.url.clone();

        if self.handler.cancel.is_cancelled() {
            // Dropped like the rest of the queue, not given up on
            queued.transition(RequestState::Abandoned)?;
            tracing::debug!("Not retrying {}: crawl stopping ({})", url, error);
            return Ok(());
        }

        if !error.is_permanent() && queued.retries < self.max_request_retries {
            queued.retries += 1;
            queued.transition(RequestState::Retrying)?;
            report.requests_retried += 1;

            tracing::warn!(
                "Request to {} failed (retry {}/{}): {}",
                url,
                queued.retries,
                self.max_request_retries,
                error
            );
            scheduler.requeue(queued)?;
        } else {
            queued.transition(RequestState::Abandoned)?;
            report.requests_abandoned += 1;
            tracing::error!(
                "Giving up on {} after {} retries: {}",
                url,
                queued.retries,
                error
            );
        }

        Ok(())
    }
}

fn record_page(report: &mut CrawlReport, page: &PageResult) {
    match page.outcome {
        ExtractionOutcome::Success(_) => report.pages_completed += 1,
        ExtractionOutcome::Empty(_) => report.pages_empty += 1,
        ExtractionOutcome::TransientFailure(_) | ExtractionOutcome::FatalFailure(_) => {
            report.pages_failed_extraction += 1
        }
    }
    report.sink_errors += page.sink_errors;
    tracing::trace!("Page accepted {} products", page.accepted);
}
