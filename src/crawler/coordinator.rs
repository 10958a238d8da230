//! Detail fetch coordination
//!
//! This module runs the only parallel part of a harvest:
//! - A pool of workers, each owning one page session for its whole life
//! - A shared queue of profile links the workers pull from
//! - Per-profile extraction, email ranking and the website fallback
//! - Submission of finished records to the run's aggregator
//!
//! The pool is drained completely before `run` returns.

use crate::config::PortalConfig;
use crate::crawler::fetcher::{PageContent, PageFetcher, SessionFactory};
use crate::crawler::parser::{email_spans, extract_details, find_contact_link, page_email_spans};
use crate::crawler::retry::RetryPolicy;
use crate::email::{rank_emails, EmailRules};
use crate::record::{CompanyRecord, EmailSource, ProfileLink};
use crate::state::RunContext;
use crate::url::website_domain;
use crate::HarvestError;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// What the worker pool did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorReport {
    /// Workers that got a session and ran
    pub workers_started: usize,
    /// Profiles a worker finished, harvested or skipped
    pub profiles_processed: usize,
    /// Links nobody picked up (cancellation, no sessions)
    pub left_in_queue: usize,
}

/// Everything a worker needs, shared by the whole pool
struct WorkerContext {
    portal: PortalConfig,
    rules: EmailRules,
    retry: RetryPolicy,
    ctx: Arc<RunContext>,
    queue: Mutex<VecDeque<ProfileLink>>,
    total: usize,
    /// Profiles finished by any worker, harvested or skipped
    finished: AtomicUsize,
}

impl WorkerContext {
    fn next_link(&self) -> Option<ProfileLink> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

/// Drives the detail worker pool
pub struct Coordinator {
    portal: PortalConfig,
    rules: EmailRules,
    factory: Arc<dyn SessionFactory>,
}

impl Coordinator {
    pub fn new(portal: PortalConfig, rules: EmailRules, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            portal,
            rules,
            factory,
        }
    }

    /// Visits every link with up to `workers` concurrent sessions
    ///
    /// Results land in `ctx.aggregator`. Links that could not be harvested,
    /// including any left over after cancellation, are recorded as skipped.
    pub async fn run(&self, ctx: Arc<RunContext>, links: Vec<ProfileLink>) -> CoordinatorReport {
        let total = links.len();
        if total == 0 {
            info!("No profile links to visit");
            return CoordinatorReport::default();
        }

        let worker_count = self.portal.workers.clamp(1, total);
        info!("Visiting {} profiles with {} workers", total, worker_count);

        let shared = Arc::new(WorkerContext {
            portal: self.portal.clone(),
            rules: self.rules.clone(),
            retry: RetryPolicy::from_portal(&self.portal),
            ctx: Arc::clone(&ctx),
            queue: Mutex::new(links.into_iter().collect()),
            total,
            finished: AtomicUsize::new(0),
        });

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            let shared = Arc::clone(&shared);
            let factory = Arc::clone(&self.factory);
            workers.spawn(async move { run_worker(id, shared, factory).await });
        }

        let mut report = CoordinatorReport::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Some(_)) => report.workers_started += 1,
                Ok(None) => {}
                Err(e) if e.is_panic() => error!("Worker panicked: {}", e),
                Err(e) => warn!("Worker did not finish: {}", e),
            }
        }

        let leftovers: Vec<ProfileLink> = shared
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        if !leftovers.is_empty() {
            let reason = if ctx.is_cancelled() {
                "cancelled before visit"
            } else {
                "no worker session available"
            };
            warn!("{} profiles were not visited: {}", leftovers.len(), reason);
            for link in &leftovers {
                ctx.aggregator.record_skip(link.url.clone(), reason);
            }
        }
        report.profiles_processed = shared.finished.load(Ordering::Relaxed);
        report.left_in_queue = leftovers.len();

        report
    }
}

/// One worker: open a session, drain the queue, close the session
///
/// Returns the number of profiles processed, or `None` if no session opened.
async fn run_worker(
    id: usize,
    shared: Arc<WorkerContext>,
    factory: Arc<dyn SessionFactory>,
) -> Option<usize> {
    let mut session = match factory.open_session().await {
        Ok(session) => session,
        Err(e) => {
            warn!("Worker {} could not open a session: {}", id, e);
            return None;
        }
    };
    debug!("Worker {} started", id);

    let ctx = &shared.ctx;
    let mut processed = 0;

    while !ctx.is_cancelled() {
        let Some(link) = shared.next_link() else {
            break;
        };

        let outcome = AssertUnwindSafe(process_profile(session.as_mut(), &link, &shared))
            .catch_unwind()
            .await;

        let cancelled = match outcome {
            Ok(Ok(record)) => {
                ctx.aggregator.submit(&link.key, record);
                false
            }
            Ok(Err(HarvestError::Cancelled)) => {
                ctx.aggregator.record_skip(link.url.clone(), "cancelled");
                true
            }
            Ok(Err(e)) => {
                warn!("Skipping profile {}: {}", link.url, e);
                ctx.aggregator.record_skip(link.url.clone(), e.to_string());
                false
            }
            Err(panic) => {
                error!(
                    "Worker {} panicked on {}: {}",
                    id,
                    link.url,
                    panic_message(panic.as_ref())
                );
                ctx.aggregator.record_skip(link.url.clone(), "worker panicked");
                false
            }
        };
        processed += 1;

        let finished = shared.finished.fetch_add(1, Ordering::Relaxed) + 1;
        if finished % 10 == 0 {
            info!("Progress: {}/{} profiles processed", finished, shared.total);
        }

        if cancelled {
            break;
        }
    }

    if let Err(e) = session.close().await {
        debug!("Worker {} failed to close its session: {}", id, e);
    }
    debug!("Worker {} finished after {} profiles", id, processed);

    Some(processed)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Fetches a URL under the retry policy
async fn fetch_with_retry(
    session: &mut dyn PageFetcher,
    url: &str,
    retry: &RetryPolicy,
    ctx: &RunContext,
) -> Result<PageContent, HarvestError> {
    let operation = format!("profile {}", url);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match session.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) => retry.backoff(&operation, attempt, e, &ctx.cancel).await?,
        }
    }
}

/// Harvests one profile into a record
async fn process_profile(
    session: &mut dyn PageFetcher,
    link: &ProfileLink,
    shared: &WorkerContext,
) -> Result<CompanyRecord, HarvestError> {
    let portal = &shared.portal;
    let fetched = fetch_with_retry(session, &link.url, &shared.retry, &shared.ctx).await?;

    if let Err(e) = session.dismiss_overlays().await {
        debug!("Overlay dismissal failed on {}: {}", link.url, e);
    }
    if let Err(e) = session.reveal_details().await {
        debug!("Could not reveal details on {}: {}", link.url, e);
    }
    match session
        .wait_for(&portal.selectors.company_name, portal.page_timeout())
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!("No company name on {}", link.url),
        Err(e) => debug!("Waiting for company name on {} failed: {}", link.url, e),
    }

    let page = session.current().await.unwrap_or(fetched);

    let details = extract_details(&page, &portal.selectors);
    let site_domain = details.website.as_deref().and_then(website_domain);
    let spans = email_spans(&page, &portal.selectors.email_containers);

    let mut record = CompanyRecord::new(link.url.clone());
    record.name = details.name;
    record.address = details.address;
    record.country = details.country;
    record.website = details.website;

    let ranked = addresses(&spans, &shared.rules, site_domain.as_deref());
    if !ranked.is_empty() {
        record.set_emails(ranked, EmailSource::ProfilePage);
    } else if portal.follow_website {
        if let Some(website) = record.website.as_deref().and_then(website_url) {
            let (ranked, source) =
                search_website(session, &website, site_domain.as_deref(), &shared.rules).await;
            record.set_emails(ranked, source);
        }
    }

    debug!(
        "Harvested {} ({})",
        record.display_name(),
        record.email.as_deref().unwrap_or("no email")
    );
    Ok(record)
}

fn addresses(spans: &[String], rules: &EmailRules, site_domain: Option<&str>) -> Vec<String> {
    rank_emails(spans, rules, site_domain)
        .into_iter()
        .map(|candidate| candidate.address)
        .collect()
}

/// Absolute URL for a scraped website value; bare hosts get `https://`
fn website_url(website: &str) -> Option<Url> {
    let website = website.trim();
    let url = if website.contains("://") {
        Url::parse(website).ok()?
    } else {
        Url::parse(&format!("https://{}", website)).ok()?
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Looks for emails on the company's home page, then on its contact page
///
/// Website failures are not retried; they only mean no email was found.
async fn search_website(
    session: &mut dyn PageFetcher,
    website: &Url,
    site_domain: Option<&str>,
    rules: &EmailRules,
) -> (Vec<String>, EmailSource) {
    let home = match session.fetch(website.as_str()).await {
        Ok(page) => page,
        Err(e) => {
            debug!("Website {} unavailable: {}", website, e);
            return (Vec::new(), EmailSource::NotFound);
        }
    };

    let ranked = addresses(&page_email_spans(&home), rules, site_domain);
    if !ranked.is_empty() {
        return (ranked, EmailSource::WebsiteHome);
    }

    let Some(contact) = find_contact_link(&home) else {
        return (Vec::new(), EmailSource::NotFound);
    };

    match session.fetch(contact.as_str()).await {
        Ok(page) => {
            let ranked = addresses(&page_email_spans(&page), rules, site_domain);
            let source = if ranked.is_empty() {
                EmailSource::NotFound
            } else {
                EmailSource::ContactPage
            };
            (ranked, source)
        }
        Err(e) => {
            debug!("Contact page {} unavailable: {}", contact, e);
            (Vec::new(), EmailSource::NotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_url() {
        assert_eq!(
            website_url("www.acme.de").map(|u| u.to_string()).as_deref(),
            Some("https://www.acme.de/")
        );
        assert_eq!(
            website_url(" http://acme.de/home ").map(|u| u.to_string()).as_deref(),
            Some("http://acme.de/home")
        );
        assert!(website_url("ftp://acme.de").is_none());
        assert!(website_url("").is_none());
    }
}
