//! Listing-Harvester: a quota-bounded product listing crawler
//!
//! This crate crawls a paginated e-commerce listing whose product data only
//! appears in client-side page state after hydration. It polls that state,
//! normalizes the product records it finds, deduplicates them against a
//! per-run quota and follows the listing's pages until the quota is met or
//! the listing runs dry.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fetcher;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Listing-Harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Invalid request state transition: {from} -> {to}")]
    InvalidTransition {
        from: state::RequestState,
        to: state::RequestState,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),
}

/// Result type alias for Listing-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlRequest};
pub use extract::{CanonicalProductRecord, ExtractionOutcome, RawProductRecord};
pub use state::{AcceptResult, CrawlTracker, RequestState};
