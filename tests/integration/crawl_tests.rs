//! Integration tests for the crawler
//!
//! Most tests drive the coordinator with a scripted in-memory fetcher so
//! every page's content and failures are under control. The last tests use
//! wiremock to run the HTTP fetcher end-to-end.

use async_trait::async_trait;
use listing_harvester::config::{Config, OutputConfig, OutputFormat};
use listing_harvester::crawler::{crawl, Coordinator};
use listing_harvester::extract::{Clock, ExtractionEngine};
use listing_harvester::fetcher::{FetchError, Fetcher, PageHandle, ProbeError, Session};
use listing_harvester::output::{MemorySink, ResultSink};
use listing_harvester::state::CrawlTracker;
use listing_harvester::url::page_number_from_url;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Clock that never sleeps
struct InstantClock;

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, _duration: Duration) {}
}

/// What the scripted fetcher serves for one page number
#[derive(Clone)]
enum PageScript {
    /// Page whose state holds these listing items
    Items(Value),
    /// Fails this many times, then serves the items
    FlakyItems(u32, Value),
    /// Navigation always fails with a retryable error
    Unreachable,
    /// Navigation fails with HTTP 404
    NotFound,
    /// Navigation never completes
    Hangs,
    /// Page loads but evaluating the listing state raises an error
    BrokenState,
    /// Page loads but evaluating the listing state never returns
    StuckState,
}

/// How a served page answers probes
enum PageState {
    Ready(Value),
    Broken,
    Stuck,
}

/// Page with a fixed listing state
struct StaticPage {
    url: String,
    state: PageState,
}

#[async_trait]
impl PageHandle for StaticPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn wait_until_loaded(&self) -> Result<(), FetchError> {
        Ok(())
    }

    async fn probe(&self, _script: &str) -> Result<Value, ProbeError> {
        match &self.state {
            PageState::Ready(items) => Ok(items.clone()),
            PageState::Broken => Err(ProbeError::Evaluation(
                "Cannot read properties of undefined".to_string(),
            )),
            PageState::Stuck => std::future::pending().await,
        }
    }
}

/// Fetcher serving scripted pages keyed by page number
///
/// Pages without a script are served with no listing items.
struct ScriptedFetcher {
    pages: Mutex<HashMap<u32, PageScript>>,
    visits: Mutex<Vec<u32>>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<(u32, PageScript)>) -> Arc<Self> {
        Arc::new(Self {
            pages: Mutex::new(pages.into_iter().collect()),
            visits: Mutex::new(Vec::new()),
        })
    }

    fn visits(&self) -> Vec<u32> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn navigate(&self, _session: &Session, url: &Url) -> Result<Box<dyn PageHandle>, FetchError> {
        let page = page_number_from_url(url);
        self.visits.lock().unwrap().push(page);

        let script = {
            let mut pages = self.pages.lock().unwrap();
            let script = pages.get(&page).cloned();
            if let Some(PageScript::FlakyItems(failures, items)) = &script {
                if *failures > 0 {
                    pages.insert(page, PageScript::FlakyItems(failures - 1, items.clone()));
                }
            }
            script
        };

        let state = match script {
            Some(PageScript::Items(items)) => PageState::Ready(items),
            Some(PageScript::FlakyItems(0, items)) => PageState::Ready(items),
            Some(PageScript::FlakyItems(_, _)) | Some(PageScript::Unreachable) => {
                return Err(FetchError::Navigation {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                })
            }
            Some(PageScript::NotFound) => {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
            }
            Some(PageScript::Hangs) => std::future::pending().await,
            Some(PageScript::BrokenState) => PageState::Broken,
            Some(PageScript::StuckState) => PageState::Stuck,
            None => PageState::Ready(Value::Null),
        };

        Ok(Box::new(StaticPage {
            url: url.to_string(),
            state,
        }))
    }
}

fn item(id: &str) -> Value {
    json!({
        "id": id,
        "designerName": "Acme",
        "name": format!("Ring {}", id),
        "unitPrice": 100,
        "unitSalePrice": 80,
        "currencyCode": "GBP",
        "url": format!("/shopping/ring-{}.aspx", id),
        "imageUrl": format!("//cdn.example.com/{}.jpg?w=300", id),
        "hasStock": true
    })
}

fn items(ids: &[&str]) -> Value {
    Value::Array(ids.iter().map(|id| item(id)).collect())
}

fn create_test_config(results_wanted: usize) -> Config {
    let mut config = Config::default();
    config.input.start_url = "https://shop.example.com/shopping/items.aspx".to_string();
    config.input.results_wanted = results_wanted;
    config.crawler.max_request_retries = 2;
    config.extraction.max_attempts = 2;
    config
}

fn coordinator(config: &Config, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn ResultSink>) -> Coordinator {
    Coordinator::new(config, fetcher, sink)
        .unwrap()
        .with_engine(ExtractionEngine::new(&config.extraction, Arc::new(InstantClock)))
}

#[tokio::test]
async fn test_quota_stops_before_next_page() {
    let config = create_test_config(3);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Items(items(&["a", "b", "c", "d", "e"])))]);
    let sink = Arc::new(MemorySink::new());

    let coordinator = coordinator(&config, fetcher.clone(), sink.clone());
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.accepted, 3);
    assert!(report.quota_reached);
    assert_eq!(sink.len(), 3);
    assert_eq!(fetcher.visits(), vec![1], "page 2 must never be dispatched");
    assert_eq!(sink.report().map(|r| r.accepted), Some(3));
}

#[tokio::test]
async fn test_duplicates_across_pages() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![
        (1, PageScript::Items(items(&["A", "B"]))),
        (2, PageScript::Items(items(&["B", "C"]))),
    ]);
    let sink = Arc::new(MemorySink::new());

    let coordinator = coordinator(&config, fetcher.clone(), sink.clone());
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    let ids: HashSet<String> = sink.records().into_iter().map(|r| r.product_id).collect();
    let expected: HashSet<String> = ["A", "B", "C"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ids, expected);

    assert_eq!(report.accepted, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.pages_completed, 2);
    // Page 3 has no items, which ends pagination
    assert_eq!(report.pages_empty, 1);
    assert_eq!(fetcher.visits(), vec![1, 2, 3]);
    assert!(!report.quota_reached);
}

#[tokio::test]
async fn test_records_are_normalized() {
    let config = create_test_config(1);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Items(items(&["x"])))]);
    let sink = Arc::new(MemorySink::new());

    let coordinator = coordinator(&config, fetcher, sink.clone());
    let seed = coordinator.seed_request();
    coordinator.run(seed).await.unwrap();

    let record = &sink.records()[0];
    assert_eq!(record.price, Some(80.0));
    assert_eq!(record.original_price, Some(100.0));
    assert_eq!(record.discount, "20%");
    assert_eq!(
        record.product_url.as_deref(),
        Some("https://shop.example.com/shopping/ring-x.aspx")
    );
    assert_eq!(record.image_url.as_deref(), Some("https://cdn.example.com/x.jpg"));
    assert!(record.in_stock);
}

#[tokio::test]
async fn test_retry_then_success() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::FlakyItems(2, items(&["a"])))]);
    let sink = Arc::new(MemorySink::new());

    let coordinator = coordinator(&config, fetcher.clone(), sink.clone());
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.accepted, 1);
    assert_eq!(report.requests_retried, 2);
    assert_eq!(report.requests_abandoned, 0);
    assert_eq!(fetcher.visits(), vec![1, 1, 1, 2]);
}

#[tokio::test]
async fn test_request_abandoned_after_retries() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Unreachable)]);
    let sink = Arc::new(MemorySink::new());

    let coordinator = coordinator(&config, fetcher.clone(), sink.clone());
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.accepted, 0);
    assert_eq!(report.requests_retried, 2);
    assert_eq!(report.requests_abandoned, 1);
    assert_eq!(fetcher.visits(), vec![1, 1, 1]);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::NotFound)]);

    let coordinator = coordinator(&config, fetcher.clone(), Arc::new(MemorySink::new()));
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.requests_retried, 0);
    assert_eq!(report.requests_abandoned, 1);
    assert_eq!(fetcher.visits(), vec![1]);
}

#[tokio::test]
async fn test_navigation_timeout_feeds_retries() {
    let mut config = create_test_config(10);
    config.crawler.navigation_timeout_secs = 1;
    config.crawler.max_request_retries = 0;
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Hangs)]);

    let coordinator = coordinator(&config, fetcher.clone(), Arc::new(MemorySink::new()));
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.requests_abandoned, 1);
    assert_eq!(fetcher.visits(), vec![1]);
}

#[tokio::test]
async fn test_handler_timeout_feeds_retries() {
    let mut config = create_test_config(10);
    config.crawler.request_handler_timeout_secs = 1;
    config.crawler.max_request_retries = 1;
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::StuckState)]);

    let coordinator = coordinator(&config, fetcher.clone(), Arc::new(MemorySink::new()));
    let sessions = coordinator.session_pool();
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.requests_retried, 1);
    assert_eq!(report.requests_abandoned, 1);
    assert_eq!(report.pages_failed_extraction, 0);
    assert_eq!(fetcher.visits(), vec![1, 1]);
    // Leases dropped by the timeout retire their sessions
    assert_eq!(sessions.retired_count(), 2);
}

#[tokio::test]
async fn test_broken_page_state_completes_without_retry() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![
        (1, PageScript::BrokenState),
        (2, PageScript::Items(items(&["a"]))),
    ]);

    let coordinator = coordinator(&config, fetcher.clone(), Arc::new(MemorySink::new()));
    let sessions = coordinator.session_pool();
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.pages_failed_extraction, 1);
    assert_eq!(report.requests_retried, 0);
    assert_eq!(report.requests_abandoned, 0);
    assert_eq!(report.accepted, 0);
    assert_eq!(fetcher.visits(), vec![1], "next page must not be followed");
    assert_eq!(sessions.retired_count(), 1);
    assert_eq!(sessions.idle_count(), 0);
}

#[tokio::test]
async fn test_healthy_session_is_reused() {
    let config = create_test_config(10);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Items(items(&["a"])))]);

    let coordinator = coordinator(&config, fetcher, Arc::new(MemorySink::new()));
    let sessions = coordinator.session_pool();
    let seed = coordinator.seed_request();
    coordinator.run(seed).await.unwrap();

    // Pages 1 and 2 share one session
    assert_eq!(sessions.created_count(), 1);
    assert_eq!(sessions.retired_count(), 0);
    assert_eq!(sessions.idle_count(), 1);
}

#[tokio::test]
async fn test_shared_tracker_sees_progress() {
    let config = create_test_config(5);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Items(items(&["a", "b"])))]);
    let tracker = CrawlTracker::new(5);

    let coordinator = coordinator(&config, fetcher, Arc::new(MemorySink::new()))
        .with_tracker(tracker.clone());
    let seed = coordinator.seed_request();
    coordinator.run(seed).await.unwrap();

    assert_eq!(tracker.accepted_count(), 2);
    assert!(!tracker.is_satisfied());
}

#[tokio::test]
async fn test_cancelled_before_start_dispatches_nothing() {
    let config = create_test_config(5);
    let fetcher = ScriptedFetcher::new(vec![(1, PageScript::Items(items(&["a"])))]);

    let coordinator = coordinator(&config, fetcher.clone(), Arc::new(MemorySink::new()));
    coordinator.cancellation_token().cancel();
    let seed = coordinator.seed_request();
    let report = coordinator.run(seed).await.unwrap();

    assert_eq!(report.accepted, 0);
    assert!(fetcher.visits().is_empty());
}

/// Renders a listing page the way the site hydrates it
fn listing_html(ids: &[&str]) -> String {
    format!(
        r#"<html><head>
        <script src="https://www.googletagmanager.com/gtm.js"></script>
        <script>window.universal_variable = {{"listing": {{"items": {}}}}};</script>
        </head><body><div id="app"></div></body></html>"#,
        items(ids)
    )
}

async fn mount_page(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path("/shopping/items.aspx"))
        .and(query_param("page", page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn http_config(server: &MockServer, results_wanted: usize, output: OutputConfig) -> Config {
    let mut config = create_test_config(results_wanted);
    config.input.start_url = format!("{}/shopping/items.aspx?page=1", server.uri());
    config.extraction.settle_delay_ms = 0;
    config.extraction.poll_interval_ms = 0;
    config.output = output;
    config
}

#[tokio::test]
async fn test_http_crawl_end_to_end() {
    let server = MockServer::start().await;
    mount_page(&server, "1", listing_html(&["101", "102"])).await;
    mount_page(&server, "2", listing_html(&["102", "103"])).await;
    mount_page(&server, "3", "<html><body>No results</body></html>".to_string()).await;

    let dir = TempDir::new().unwrap();
    let output_path = dir.path().join("products.jsonl");
    let config = http_config(
        &server,
        10,
        OutputConfig {
            path: output_path.display().to_string(),
            format: OutputFormat::Jsonl,
        },
    );

    let report = crawl(&config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.accepted, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.pages_completed, 2);
    assert_eq!(report.pages_empty, 1);

    let content = std::fs::read_to_string(&output_path).unwrap();
    let ids: Vec<String> = content
        .lines()
        .map(|line| {
            let value: Value = serde_json::from_str(line).unwrap();
            value["product_id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, vec!["101", "102", "103"]);

    let first: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(
        first["product_url"],
        format!("{}/shopping/ring-101.aspx", server.uri())
    );
}

#[tokio::test]
async fn test_http_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shopping/items.aspx"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = http_config(
        &server,
        10,
        OutputConfig {
            path: dir.path().join("products.db").display().to_string(),
            format: OutputFormat::Sqlite,
        },
    );

    let report = crawl(&config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.accepted, 0);
    assert_eq!(report.requests_retried, 2);
    assert_eq!(report.requests_abandoned, 1);
}
