//! Crawler module: list traversal and profile harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Page sessions over plain HTTP or a Chromium browser
//! - Selector-driven extraction from list and profile pages
//! - Retry with backoff and pacing of list page requests
//! - The list page state machine and the profile worker pool

mod browser;
mod coordinator;
mod fetcher;
mod orchestrator;
mod parser;
mod retry;
mod scheduler;

pub use browser::{BrowserFetcher, BrowserSessionFactory};
pub use coordinator::{Coordinator, CoordinatorReport};
pub use fetcher::{
    build_http_client, create_session_factory, HttpFetcher, HttpSessionFactory, PageContent,
    PageFetcher, SessionFactory,
};
pub use orchestrator::{Orchestrator, TraversalReport};
pub use parser::{
    email_spans, extract_details, find_contact_link, first_href, page_email_spans,
    parse_list_page, select_first_text, ListPage, ProfileDetails,
};
pub use retry::{RetryPolicy, MAX_BACKOFF};
pub use scheduler::Pacer;

use crate::config::{resolve_portal, Config, PortalConfig, RunOptions};
use crate::email::EmailRules;
use crate::output::{RunOutput, ScrapeSummary};
use crate::record::{CompanyRecord, ProfileLink, SkippedProfile};
use crate::state::RunContext;
use crate::HarvestError;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Deduplicated profile links in discovery order
    pub links: Vec<ProfileLink>,
    /// Harvested records in link order
    pub records: Vec<CompanyRecord>,
    pub skipped: Vec<SkippedProfile>,
    pub summary: ScrapeSummary,
}

impl HarvestOutcome {
    /// Borrowed view handed to the output sinks
    pub fn run_output(&self) -> RunOutput<'_> {
        RunOutput {
            links: &self.links,
            records: &self.records,
            skipped: &self.skipped,
            summary: &self.summary,
        }
    }
}

/// Runs a complete harvest for the portal and sector in `options`
///
/// This is the main entry point. It will:
/// 1. Resolve the portal definition and apply command-line overrides
/// 2. Build the email rules from the `[email]` table
/// 3. Start the fetch engine the portal asks for
/// 4. Walk the list pages, then visit every profile
/// 5. Shut the engine down and build the summary
///
/// # Example
///
/// ```no_run
/// use portal_harvest::config::load_config;
/// use portal_harvest::crawler::harvest;
/// use portal_harvest::RunOptions;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config/portals.toml"))?;
/// let options = RunOptions::new("europages", "packaging");
/// let outcome = harvest(&config, &options, CancellationToken::new()).await?;
/// println!("{} companies", outcome.records.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest(
    config: &Config,
    options: &RunOptions,
    cancel: CancellationToken,
) -> Result<HarvestOutcome, HarvestError> {
    let portal = resolve_portal(config, options)?;
    let rules = EmailRules::from_config(&config.email)?;
    let ctx = Arc::new(RunContext::with_cancel(
        &options.portal,
        &options.sector,
        cancel,
    ));

    let factory = create_session_factory(&portal, options.headless).await?;
    let outcome = run_with_factory(&portal, rules, Arc::clone(&factory), ctx).await;
    factory.shutdown().await;

    outcome
}

/// Runs traversal and profile harvesting with an already chosen session factory
///
/// Traversal uses one session of its own; the worker pool opens one more per
/// worker. The factory itself is left running.
pub async fn run_with_factory(
    portal: &PortalConfig,
    rules: EmailRules,
    factory: Arc<dyn SessionFactory>,
    ctx: Arc<RunContext>,
) -> Result<HarvestOutcome, HarvestError> {
    info!("Harvesting '{}' from {}", ctx.sector, ctx.portal);

    let mut session = factory.open_session().await?;
    let traversal = Orchestrator::new(portal, &ctx).run(session.as_mut()).await;
    if let Err(e) = session.close().await {
        debug!("Failed to close traversal session: {}", e);
    }
    let traversal = traversal?;

    let links = ctx.links();
    Coordinator::new(portal.clone(), rules, factory)
        .run(Arc::clone(&ctx), links.clone())
        .await;

    let (records, skipped) = ctx.aggregator.finish(&links);
    let summary = ScrapeSummary::build(&ctx, &traversal, &records, &skipped, Utc::now());

    info!(
        "Harvest complete: {} records, {} with email, {} skipped",
        summary.profiles_found, summary.profiles_with_email, summary.skipped
    );

    Ok(HarvestOutcome {
        links,
        records,
        skipped,
        summary,
    })
}
