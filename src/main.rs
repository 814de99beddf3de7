//! Sumi-Mirror main entry point
//!
//! This is the command-line interface for the Sumi-Mirror site mirror.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use sumi_mirror::config::{load_config_with_hash, Config};
use sumi_mirror::mirror::{plan_pages, Orchestrator};
use sumi_mirror::output::{print_mirror_summary, print_validation_report, write_json_artifact};
use sumi_mirror::storage::MirrorLayout;
use sumi_mirror::validate::Validator;
use tracing_subscriber::EnvFilter;

/// Sumi-Mirror: a faithful site mirror
///
/// Sumi-Mirror copies a fixed set of pages from a live site into a
/// self-contained local mirror, deduplicating images and rewriting links,
/// then scores how faithfully the mirror reproduces the origin.
#[derive(Parser, Debug)]
#[command(name = "sumi-mirror")]
#[command(version = "1.0.0")]
#[command(about = "A faithful site mirror with fidelity scoring", long_about = None)]
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

    /// Validate config and show what would be mirrored without fetching anything
    #[arg(long, conflicts_with_all = ["mirror_only", "validate_only"])]
    dry_run: bool,

    /// Mirror the site without validating it afterwards
    #[arg(long, conflicts_with_all = ["dry_run", "validate_only"])]
    mirror_only: bool,

    /// Validate an existing mirror without mirroring first
    #[arg(long, conflicts_with_all = ["dry_run", "mirror_only"])]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    if !cli.validate_only {
        handle_mirror(&config, &config_hash).await?;
    }
    if !cli.mirror_only {
        handle_validate(&config).await?;
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
            0 => EnvFilter::new("sumi_mirror=info,warn"),
            1 => EnvFilter::new("sumi_mirror=debug,info"),
            2 => EnvFilter::new("sumi_mirror=trace,debug"),
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

/// Handles the --dry-run mode: shows the planned pages and layout
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let layout = MirrorLayout::from_config(&config.mirror);
    let pages = plan_pages(config, &layout)?;

    println!("=== Sumi-Mirror Dry Run ===\n");

    println!("Origin:");
    println!("  Base URL: {}", config.origin.base_url);
    println!("  Page style: {}", config.origin.page_style.as_str());
    if !config.origin.aliases.is_empty() {
        println!("  Aliases: {}", config.origin.aliases.join(", "));
    }

    println!("\nMirror:");
    println!("  Pages: {}", layout.pages_path().display());
    println!("  Assets: {}", layout.assets_path().display());
    println!("  Concurrency: {}", config.mirror.concurrency);
    println!("  Reuse assets: {}", config.mirror.reuse_assets);

    println!("\nFetch:");
    println!("  Max retries: {}", config.fetch.max_retries);
    println!("  Backoff: {}ms base, {}ms max", config.fetch.backoff_base_ms, config.fetch.backoff_max_ms);
    println!("  Timeout: {}s", config.fetch.timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nPages ({}):", pages.len());
    for page in &pages {
        println!("  - {} <- {}", page.name, page.origin_url);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would mirror {} pages", pages.len());

    Ok(())
}

/// Handles the mirror run; Ctrl-C stops dispatching new pages
async fn handle_mirror(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(config.clone())?.with_config_hash(config_hash);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            cancel.cancel();
        }
    });

    let result = orchestrator.run().await.context("Mirror run failed")?;
    print_mirror_summary(&result);

    Ok(())
}

/// Handles the validation run and writes the report
async fn handle_validate(config: &Config) -> anyhow::Result<()> {
    let report = Validator::from_config(config)?
        .validate()
        .await
        .context("Validation failed")?;
    print_validation_report(&report);

    let report_path = Path::new(&config.validator.report_path);
    write_json_artifact(&report, report_path)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    println!("\n✓ Report written to: {}", report_path.display());

    Ok(())
}
