//! Listing-Harvester main entry point
//!
//! This is the command-line interface for the Listing-Harvester crawler.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{
    coerce_results_wanted_str, effective_config_hash, load_config, validate, Config, OutputFormat,
};
use listing_harvester::crawler::crawl;
use listing_harvester::output::print_report;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Listing-Harvester: a quota-bounded product listing crawler
///
/// Listing-Harvester walks a paginated product listing, reads the product
/// data each page hydrates on the client, and stops once enough distinct
/// products have been collected.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A quota-bounded product listing crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Listing page to start from
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Number of distinct products to collect
    #[arg(long, value_name = "N")]
    results_wanted: Option<String>,

    /// Output file path
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let config_hash = effective_config_hash(&config);
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else {
        handle_crawl(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(start_url) = &cli.start_url {
        config.input.start_url = start_url.clone();
    }
    if let Some(results_wanted) = &cli.results_wanted {
        config.input.results_wanted = coerce_results_wanted_str(results_wanted);
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Listing-Harvester Dry Run ===\n");

    println!("Input:");
    println!("  Start URL: {}", config.input.start_url);
    println!("  Results wanted: {}", config.input.results_wanted);
    println!("  Sort: {}", config.input.sort_by);
    if let Some(min) = config.input.min_price {
        println!("  Min price: {}", min);
    }
    if let Some(max) = config.input.max_price {
        println!("  Max price: {}", max);
    }
    println!("  Proxies: {}", config.input.proxy.urls.len());

    println!("\nCrawler:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max request retries: {}", config.crawler.max_request_retries);
    println!(
        "  Timeouts: navigation {:?}, handler {:?}",
        config.crawler.navigation_timeout(),
        config.crawler.handler_timeout()
    );

    println!("\nExtraction:");
    println!("  Probe: {}", config.extraction.probe_script);
    println!(
        "  Settle {:?}, then {} polls every {:?}",
        config.extraction.settle_delay(),
        config.extraction.max_attempts,
        config.extraction.poll_interval()
    );

    println!("\nOutput:");
    println!("  {:?} -> {}", config.output.format, config.output.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    // Ctrl-C stops dispatching; in-flight pages still finish
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            on_signal.cancel();
        }
    });

    let report = crawl(config, config_hash, cancel).await.context("Crawl failed")?;
    print_report(&report);

    Ok(())
}
