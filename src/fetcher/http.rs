//! HTTP page fetcher
//!
//! This module provides a [`Fetcher`] backed by `reqwest`. It does not run
//! page scripts; instead it reads the state a page ships inline:
//! - globals assigned in inline `<script>` blocks (`window.x = {...}`)
//! - JSON data blocks (`<script id="x" type="application/json">`)
//!
//! Probes rooted at either kind of global are answered from that state.

use crate::config::FetcherConfig;
use crate::fetcher::probe::{find_global_assignment, ProbePath};
use crate::fetcher::{BlockList, FetchError, Fetcher, PageHandle, ProbeError, Session};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - User-Agent header value
/// * `proxy_url` - Optional proxy all traffic is routed through
/// * `timeout` - Overall request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. invalid proxy URL)
pub fn build_http_client(
    user_agent: &str,
    proxy_url: Option<&str>,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy_url {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    builder.build()
}

/// Fetcher that downloads pages over HTTP and reads their inline state
pub struct HttpFetcher {
    user_agent: String,
    blocklist: BlockList,
    timeout: Duration,
    // One client per proxy endpoint; `None` is the direct connection
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl HttpFetcher {
    /// Creates a fetcher from configuration
    ///
    /// `timeout` bounds each HTTP request and is usually the navigation
    /// timeout.
    pub fn new(config: &FetcherConfig, timeout: Duration) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            blocklist: BlockList::new(config.blocked_patterns.iter().cloned()),
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn client_for(&self, proxy_url: Option<&str>) -> Result<Client, FetchError> {
        let key = proxy_url.map(str::to_string);
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_http_client(&self.user_agent, proxy_url, self.timeout)?;
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn navigate(
        &self,
        session: &Session,
        url: &Url,
    ) -> Result<Box<dyn PageHandle>, FetchError> {
        if let Some(pattern) = self.blocklist.matching_rule(url.as_str()) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                pattern: pattern.to_string(),
            });
        }

        let client = self.client_for(session.proxy_url())?;
        tracing::debug!("GET {} (session {})", url, session.id());

        let response = client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    after: self.timeout,
                }
            } else {
                FetchError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(Box::new(HttpPage::from_html(url.as_str(), &body)))
    }
}

/// A downloaded page with its inline script state
#[derive(Debug, Clone)]
pub struct HttpPage {
    url: String,
    inline_scripts: Vec<String>,
    json_blocks: HashMap<String, String>,
}

impl HttpPage {
    /// Collects the inline scripts and JSON data blocks of a document
    pub fn from_html(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut inline_scripts = Vec::new();
        let mut json_blocks = HashMap::new();

        if let Ok(selector) = Selector::parse("script") {
            for script in document.select(&selector) {
                let element = script.value();
                if element.attr("src").is_some() {
                    continue;
                }

                let text: String = script.text().collect();
                let is_json = element
                    .attr("type")
                    .map(|t| t.contains("json"))
                    .unwrap_or(false);

                match (is_json, element.attr("id")) {
                    (true, Some(id)) => {
                        json_blocks.insert(id.to_string(), text);
                    }
                    (true, None) => {}
                    (false, _) => inline_scripts.push(text),
                }
            }
        }

        Self {
            url: url.to_string(),
            inline_scripts,
            json_blocks,
        }
    }

    /// Looks up the JSON text backing a page global
    fn global_source(&self, name: &str) -> Option<&str> {
        if let Some(block) = self.json_blocks.get(name) {
            return Some(block.as_str());
        }

        self.inline_scripts
            .iter()
            .find_map(|script| find_global_assignment(script, name))
    }
}

#[async_trait]
impl PageHandle for HttpPage {
    fn url(&self) -> &str {
        &self.url
    }

    async fn wait_until_loaded(&self) -> Result<(), FetchError> {
        // The full document is already in memory
        Ok(())
    }

    async fn probe(&self, script: &str) -> Result<Value, ProbeError> {
        let path = ProbePath::parse(script)?;

        let Some(source) = self.global_source(path.root()) else {
            return Ok(Value::Null);
        };

        let root: Value = serde_json::from_str(source).map_err(|e| {
            ProbeError::Evaluation(format!("global '{}' is not valid JSON: {}", path.root(), e))
        })?;

        Ok(path.resolve(&root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LISTING_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
  <script src="https://www.googletagmanager.com/gtm.js"></script>
  <script>window.dataLayer = [];</script>
  <script>
    window.universal_variable = {"listing": {"items": [
      {"id": 101, "designerName": "Acme", "unitPrice": 100},
      {"id": 102, "designerName": "Bolt", "unitPrice": 80}
    ]}};
  </script>
  <script id="__NEXT_DATA__" type="application/json">{"props": {"pageProps": {"total": 2}}}</script>
</head>
<body></body>
</html>"#;

    #[tokio::test]
    async fn test_probe_inline_global() {
        let page = HttpPage::from_html("https://shop.example.com/items", LISTING_HTML);

        let items = page
            .probe("window.universal_variable?.listing?.items")
            .await
            .unwrap();

        assert_eq!(items.as_array().map(Vec::len), Some(2));
        assert_eq!(items[1]["designerName"], "Bolt");
    }

    #[tokio::test]
    async fn test_probe_json_block() {
        let page = HttpPage::from_html("https://shop.example.com/items", LISTING_HTML);

        let total = page
            .probe("window.__NEXT_DATA__.props.pageProps.total")
            .await
            .unwrap();

        assert_eq!(total, json!(2));
    }

    #[tokio::test]
    async fn test_probe_missing_global_is_null() {
        let page = HttpPage::from_html("https://shop.example.com/items", "<html></html>");

        let value = page
            .probe("window.universal_variable?.listing?.items")
            .await
            .unwrap();

        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_probe_non_json_literal_is_an_error() {
        let html = "<script>window.universal_variable = {listing: {items: []}};</script>";
        let page = HttpPage::from_html("https://shop.example.com/items", html);

        let result = page.probe("window.universal_variable?.listing?.items").await;
        assert!(matches!(result, Err(ProbeError::Evaluation(_))));
    }

    #[tokio::test]
    async fn test_blocked_navigation() {
        let fetcher = HttpFetcher::new(&FetcherConfig::default(), Duration::from_secs(5));
        let session = Session::new(0, None);
        let url = Url::parse("https://www.google-analytics.com/collect").unwrap();

        let result = fetcher.navigate(&session, &url).await;
        assert!(matches!(result, Err(FetchError::Blocked { .. })));
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client("TestAgent/1.0", None, Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
