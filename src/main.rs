//! Portal-Harvest main entry point
//!
//! This is the command-line interface for the Portal-Harvest company harvester.

use anyhow::Context;
use clap::Parser;
use portal_harvest::config::{
    load_config_with_hash, resolve_portal, Config, Engine, PaginationStyle,
};
use portal_harvest::crawler::harvest;
use portal_harvest::output::{default_sinks, output_paths, print_summary, write_outputs};
use portal_harvest::RunOptions;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Portal-Harvest: a company directory harvester
///
/// Portal-Harvest walks the search results of a B2B directory portal for one
/// sector, visits every company profile and collects names, countries,
/// websites and the most business-like email address of each company.
#[derive(Parser, Debug)]
#[command(name = "portal-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A company directory harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/portals.toml")]
    config: PathBuf,

    /// Portal to harvest, as named in the configuration
    #[arg(short, long)]
    portal: String,

    /// Sector (search term) to harvest
    #[arg(short, long)]
    sector: String,

    /// Override the portal's maximum number of list pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Override the portal's number of profile workers
    #[arg(long)]
    workers: Option<usize>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    no_headless: bool,

    /// Directory for the database and summary (defaults to the config value)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let options = RunOptions {
        max_pages: cli.max_pages,
        workers: cli.workers,
        headless: !cli.no_headless,
        ..RunOptions::new(cli.portal.clone(), cli.sector.clone())
    };
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.output_dir));

    if cli.dry_run {
        return handle_dry_run(&config, &options, &output_dir);
    }

    handle_harvest(&config, &options, config_hash, &output_dir).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("portal_harvest=info,warn"),
            1 => EnvFilter::new("portal_harvest=debug,info"),
            2 => EnvFilter::new("portal_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates the portal and shows the plan
fn handle_dry_run(
    config: &Config,
    options: &RunOptions,
    output_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let portal = resolve_portal(config, options)?;

    println!("=== Portal-Harvest Dry Run ===\n");

    println!("Portal: {}", options.portal);
    println!(
        "  Engine: {}",
        match portal.engine {
            Engine::Browser => "browser",
            Engine::Requests => "requests",
        }
    );
    println!(
        "  Pagination: {}",
        match portal.pagination {
            PaginationStyle::UrlTemplate => "url-template",
            PaginationStyle::Click => "click",
        }
    );
    println!("  Max pages: {}", portal.max_pages);
    println!("  Workers: {}", portal.workers);
    println!("  Delay between requests: {}ms", portal.delay_between_requests);
    println!(
        "  Retries: {} (base delay {}ms)",
        portal.max_retries, portal.retry_base_delay
    );
    println!("  Follow websites: {}", portal.follow_website);

    println!("\nSelectors:");
    for (name, selector) in portal.selectors.named() {
        println!("  {}: {}", name, selector);
    }

    println!("\nSector: {}", options.sector);
    println!("  First list page: {}", portal.list_url(&options.sector, 1));

    let (db_path, summary_path) = output_paths(output_dir, &options.portal, &options.sector);
    println!("\nOutput:");
    println!("  Database: {}", db_path.display());
    println!("  Summary: {}", summary_path.display());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: &Config,
    options: &RunOptions,
    config_hash: String,
    output_dir: &std::path::Path,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work");
            on_interrupt.cancel();
        }
    });

    let mut outcome = match harvest(config, options, cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };
    outcome.summary.config_hash = Some(config_hash);

    let sinks = default_sinks(output_dir, &options.portal, &options.sector)
        .with_context(|| format!("Failed to open outputs in {}", output_dir.display()))?;
    write_outputs(&sinks, &outcome.run_output())?;

    print_summary(&outcome.summary);

    let (db_path, summary_path) = output_paths(output_dir, &options.portal, &options.sector);
    tracing::info!(
        "Results written to {} and {}",
        db_path.display(),
        summary_path.display()
    );

    Ok(())
}
