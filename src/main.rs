//! Driftnet main entry point
//!
//! This is the command-line interface for the Driftnet harvester.

use anyhow::Context;
use clap::Parser;
use driftnet::config::{load_config_with_hash, Config};
use driftnet::crawler::{Harvester, PlatformClient, Retrier, RetryPolicy};
use driftnet::notify::build_notifier;
use driftnet::storage::SqliteStore;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Driftnet: an incremental social-platform harvester
///
/// Driftnet pages through creator timelines, keyword searches and comment
/// threads, storing only what changed since the previous run.
#[derive(Parser, Debug)]
#[command(name = "driftnet")]
#[command(version = "1.0.0")]
#[command(about = "An incremental social-platform harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with_all = ["stats", "probe"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "probe"])]
    stats: bool,

    /// Check whether the configured session is logged in and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.probe {
        handle_probe(&config).await?;
    } else {
        handle_harvest(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("driftnet=info,warn"),
            1 => EnvFilter::new("driftnet=debug,info"),
            2 => EnvFilter::new("driftnet=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Driftnet Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Crawl interval: {}ms", config.crawler.crawl_interval);
    println!("  Minimum interval: {}ms", config.crawler.min_interval);
    println!("  Interval jitter: {}", config.crawler.interval_jitter);
    println!("  Concurrent tasks: {}", config.crawler.max_concurrent_tasks);
    println!(
        "  Comments: {} (max {} per note, replies {})",
        config.crawler.enable_comments,
        config.crawler.max_comments_per_note,
        config.crawler.enable_sub_comments
    );
    println!("  Media download: {}", config.crawler.enable_media);

    println!("\nPlatform:");
    println!("  Host: {}", config.platform.host);
    println!("  Image proxy: {}", config.platform.image_proxy_host);
    println!(
        "  Cookies: {}",
        if config.platform.cookies.is_empty() {
            "none"
        } else {
            "configured"
        }
    );

    println!("\nRetry:");
    println!(
        "  {} attempts, backoff {}ms doubling up to {}ms",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!(
        "  Escalation: {}",
        config
            .notification
            .webhook_url
            .as_deref()
            .unwrap_or("log only")
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Media: {}", config.output.media_dir);

    println!("\nCreators ({}):", config.creators.len());
    for creator in &config.creators {
        match &creator.container_id {
            Some(container) => println!("  - {} (container {})", creator.id, container),
            None => println!("  - {}", creator.id),
        }
    }

    println!(
        "\nKeywords ({}, {:?}, {} pages each):",
        config.search.keywords.len(),
        config.search.search_type,
        config.search.max_pages
    );
    for keyword in &config.search.keywords {
        println!("  - {}", keyword);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would harvest {} work units",
        config.creators.len() + config.search.keywords.len()
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::new(
        Path::new(&config.output.database_path),
        Path::new(&config.output.media_dir),
    )?;

    println!("Notes:    {}", store.count_notes()?);
    println!("Comments: {}", store.count_comments()?);
    println!("Creators: {}", store.count_creators()?);

    let checkpoints = store.list_checkpoints()?;
    if !checkpoints.is_empty() {
        println!("\nCheckpoints:");
        for (owner, ts) in checkpoints {
            let when = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| ts.to_string());
            println!("  {}: {}", owner, when);
        }
    }

    if let Some(run) = store.get_latest_run()? {
        println!("\nLatest run #{} ({:?})", run.id, run.status);
        println!("  Started:  {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Stored {} notes, {} comments; {} units failed",
            run.stats.notes_stored, run.stats.comments_stored, run.stats.units_failed
        );
    }

    Ok(())
}

/// Handles the --probe mode: checks the configured session
async fn handle_probe(config: &Config) -> anyhow::Result<()> {
    let retrier = Retrier::new(
        RetryPolicy::from_config(&config.retry),
        build_notifier(&config.notification),
        CancellationToken::new(),
    );
    let client = PlatformClient::from_config(&config.platform, retrier)?;

    if client.probe().await {
        println!("✓ Session is logged in");
        Ok(())
    } else {
        anyhow::bail!("session is not logged in")
    }
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Creators: {}, Keywords: {}",
        config.creators.len(),
        config.search.keywords.len()
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next wait");
            shutdown.cancel();
        }
    });

    let harvester = Harvester::from_config(config, config_hash, cancel)?;
    let summary = harvester.run().await?;

    if summary.cancelled {
        tracing::warn!("Harvest interrupted; already stored data is kept");
    } else {
        tracing::info!("Harvest completed");
    }
    Ok(())
}
