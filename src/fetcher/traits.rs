//! Fetcher and page handle interfaces
//!
//! The crawl core never talks to a transport directly. It asks a [`Fetcher`]
//! to navigate a session to a URL and then reads the rendered page through a
//! [`PageHandle`], whose only data access is a read-only probe against the
//! page's in-memory state.

use crate::fetcher::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors raised while navigating to a page
///
/// Every variant feeds the per-request retry policy.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Request to {url} blocked by rule '{pattern}'")]
    Blocked { url: String, pattern: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Session pool is closed")]
    SessionPoolClosed,
}

impl FetchError {
    /// Returns true if retrying the same URL cannot succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            Self::Blocked { .. } | Self::SessionPoolClosed => true,
            Self::Status { status, .. } => *status == 404 || *status == 410,
            _ => false,
        }
    }
}

/// Errors raised by a probe evaluated against page state
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid probe script '{0}'")]
    InvalidScript(String),

    #[error("Probe evaluation failed: {0}")]
    Evaluation(String),
}

/// A rendered page
#[async_trait]
pub trait PageHandle: Send + Sync {
    /// URL the page was loaded from
    fn url(&self) -> &str;

    /// Resolves once the page reports its document as loaded
    ///
    /// Client-side data may still be missing at this point.
    async fn wait_until_loaded(&self) -> Result<(), FetchError>;

    /// Evaluates a read-only expression against the page state
    ///
    /// Returns `Value::Null` when the expression resolves to nothing yet.
    async fn probe(&self, script: &str) -> Result<Value, ProbeError>;
}

/// Page-loading transport
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Navigates `session` to `url` and returns the loaded page
    async fn navigate(&self, session: &Session, url: &Url)
        -> Result<Box<dyn PageHandle>, FetchError>;
}
