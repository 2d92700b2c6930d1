use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, FetcherConfig, InputConfig, OutputConfig,
    SessionConfig,
};
use crate::fetcher::ProbePath;
use crate::url::parse_listing_url;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_input_config(&config.input)?;
    validate_crawler_config(&config.crawler)?;
    validate_session_config(&config.session)?;
    validate_extraction_config(&config.extraction)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the crawl input
fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    parse_listing_url(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start-url: {}", e)))?;

    if let Some(origin) = &config.site_origin {
        parse_listing_url(origin)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site-origin: {}", e)))?;
    }

    for (name, value) in [("min-price", config.min_price), ("max-price", config.max_price)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "{} must be a non-negative number, got {}",
                    name, v
                )));
            }
        }
    }

    if let (Some(min), Some(max)) = (config.min_price, config.max_price) {
        if min > 0.0 && max > 0.0 && min > max {
            return Err(ConfigError::Validation(format!(
                "min-price ({}) must not exceed max-price ({})",
                min, max
            )));
        }
    }

    for proxy in &config.proxy.urls {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", proxy, e)))?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.max_request_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-request-retries must be <= 20, got {}",
            config.max_request_retries
        )));
    }

    if config.request_handler_timeout_secs == 0 || config.navigation_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-handler-timeout-secs and navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.navigation_timeout_secs > config.request_handler_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "navigation-timeout-secs ({}) must not exceed request-handler-timeout-secs ({})",
            config.navigation_timeout_secs, config.request_handler_timeout_secs
        )));
    }

    Ok(())
}

/// Validates session pool sizing
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.max_pool_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pool-size must be >= 1, got {}",
            config.max_pool_size
        )));
    }

    if config.max_usage_count < 1 {
        return Err(ConfigError::Validation(format!(
            "max-usage-count must be >= 1, got {}",
            config.max_usage_count
        )));
    }

    Ok(())
}

/// Validates hydration polling parameters
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.probe_script.trim().is_empty() {
        return Err(ConfigError::Validation(
            "probe-script cannot be empty".to_string(),
        ));
    }

    // Only property paths off a page global can be evaluated
    ProbePath::parse(&config.probe_script)
        .map_err(|e| ConfigError::Validation(format!("probe-script: {}", e)))?;

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.blocked_patterns.iter().any(|p| p.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "blocked-patterns cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation("output path cannot be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_bad_start_url() {
        let mut config = Config::default();
        config.input.start_url = "ftp://shop.example.com/items".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_rejects_inverted_price_range() {
        let mut config = Config::default();
        config.input.min_price = Some(500.0);
        config.input.max_price = Some(100.0);
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_navigation_longer_than_handler() {
        let mut config = Config::default();
        config.crawler.navigation_timeout_secs = 120;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_attempts_and_pool() {
        let mut config = Config::default();
        config.extraction.max_attempts = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.session.max_pool_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_probe_script_must_be_a_property_path() {
        let mut config = Config::default();
        config.extraction.probe_script = "window.__NEXT_DATA__.props.pageProps".to_string();
        assert!(validate(&config).is_ok());

        config.extraction.probe_script = "document.querySelectorAll('.item')".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.extraction.probe_script = "   ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_proxy() {
        let mut config = Config::default();
        config.input.proxy.urls = vec!["not a proxy".to_string()];
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }
}
