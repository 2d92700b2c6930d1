use crate::url::SortOrder;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Listing crawled when no start URL is configured
pub const DEFAULT_START_URL: &str =
    "https://www.farfetch.com/uk/shopping/women/jewellery-1/items.aspx";

/// Quota used when `results-wanted` is missing or not a number
pub const DEFAULT_RESULTS_WANTED: usize = 20;

/// Probe evaluated against the page to read the hydrated listing items
pub const DEFAULT_PROBE_SCRIPT: &str = "window.universal_variable?.listing?.items";

/// URL fragments of analytics and tracking hosts that are never fetched
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    "google-analytics",
    "googletagmanager",
    "hotjar",
    "facebook",
    "doubleclick",
    "tiktok",
    "analytics",
];

/// Main configuration structure for Listing-Harvester
///
/// Every table and key is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub crawler: CrawlerConfig,
    pub session: SessionConfig,
    pub extraction: ExtractionConfig,
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
}

/// What to crawl and how many records to keep
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputConfig {
    /// First listing page to fetch
    pub start_url: String,

    /// Origin used to absolutize product links (defaults to the start URL's)
    pub site_origin: Option<String>,

    /// Lower price bound, merged into the query if absent
    pub min_price: Option<f64>,

    /// Upper price bound, merged into the query if absent
    pub max_price: Option<f64>,

    /// Listing order
    pub sort_by: SortOrder,

    /// Number of unique records to collect before stopping
    #[serde(deserialize_with = "deserialize_results_wanted")]
    pub results_wanted: usize,

    /// Proxy settings forwarded to the session pool
    pub proxy: ProxyConfig,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            site_origin: None,
            min_price: None,
            max_price: None,
            sort_by: SortOrder::Default,
            results_wanted: DEFAULT_RESULTS_WANTED,
            proxy: ProxyConfig::default(),
        }
    }
}

/// Proxy endpoints handed to sessions in rotation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub urls: Vec<String>,
}

/// Crawl scheduling and retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of listing pages processed at once
    pub max_concurrency: u32,

    /// Retries per request after a navigation or fetch failure
    pub max_request_retries: u32,

    /// Upper bound for one request's full pipeline (seconds)
    pub request_handler_timeout_secs: u64,

    /// Upper bound for navigation alone (seconds)
    pub navigation_timeout_secs: u64,
}

impl CrawlerConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.request_handler_timeout_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 3,
            max_request_retries: 3,
            request_handler_timeout_secs: 90,
            navigation_timeout_secs: 45,
        }
    }
}

/// Session pool sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Number of sessions that may exist at once
    pub max_pool_size: u32,

    /// Requests a session serves before it is retired
    pub max_usage_count: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 3,
            max_usage_count: 5,
        }
    }
}

/// Hydration polling parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Delay after load readiness before the first probe (milliseconds)
    pub settle_delay_ms: u64,

    /// Delay before each probe attempt (milliseconds)
    pub poll_interval_ms: u64,

    /// Number of probe attempts before giving up on a page
    pub max_attempts: u32,

    /// Expression evaluated against the page state
    pub probe_script: String,
}

impl ExtractionConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 1500,
            poll_interval_ms: 500,
            max_attempts: 8,
            probe_script: DEFAULT_PROBE_SCRIPT.to_string(),
        }
    }
}

/// HTTP fetcher settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// URL fragments that are never requested
    pub blocked_patterns: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0"
                .to_string(),
            blocked_patterns: DEFAULT_BLOCKED_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File the accepted records are written to
    pub path: String,

    /// Sink format
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "products.jsonl".to_string(),
            format: OutputFormat::Jsonl,
        }
    }
}

/// Supported result sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// SQLite database with a runs and a products table
    Sqlite,
}

fn deserialize_results_wanted<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = toml::Value::deserialize(deserializer)?;
    Ok(coerce_results_wanted(&value))
}

/// Coerces a loosely typed quota into a positive count
///
/// Integers, floats and numeric strings are accepted; fractional values are
/// rounded up and anything below 1 becomes 1. Values that are not numbers at
/// all fall back to [`DEFAULT_RESULTS_WANTED`].
pub fn coerce_results_wanted(value: &toml::Value) -> usize {
    let number = match value {
        toml::Value::Integer(i) => Some(*i as f64),
        toml::Value::Float(f) => Some(*f),
        toml::Value::String(s) => return coerce_results_wanted_str(s),
        _ => None,
    };
    clamp_count(number)
}

/// String form of [`coerce_results_wanted`], used for CLI overrides
pub fn coerce_results_wanted_str(value: &str) -> usize {
    clamp_count(value.trim().parse::<f64>().ok())
}

fn clamp_count(number: Option<f64>) -> usize {
    match number.filter(|n| n.is_finite()) {
        Some(n) => n.ceil().max(1.0) as usize,
        None => DEFAULT_RESULTS_WANTED,
    }
}
