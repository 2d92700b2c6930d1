//! Configuration module for Listing-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use listing_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Collecting {} products", config.input.results_wanted);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    coerce_results_wanted, coerce_results_wanted_str, Config, CrawlerConfig, ExtractionConfig,
    FetcherConfig, InputConfig, OutputConfig, OutputFormat, ProxyConfig, SessionConfig,
    DEFAULT_BLOCKED_PATTERNS, DEFAULT_PROBE_SCRIPT, DEFAULT_RESULTS_WANTED, DEFAULT_START_URL,
};

// Re-export parser functions
pub use parser::{effective_config_hash, hash_content, load_config, parse_config};
pub use validation::validate;
