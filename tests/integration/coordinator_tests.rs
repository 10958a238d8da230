//! Integration tests for the detail worker pool
//!
//! These tests drive the coordinator with an in-memory session factory so
//! that concurrency, skipping and cancellation can be checked without a
//! network.

use async_trait::async_trait;
use portal_harvest::config::parse_config;
use portal_harvest::crawler::{
    run_with_factory, Coordinator, PageContent, PageFetcher, SessionFactory,
};
use portal_harvest::email::EmailRules;
use portal_harvest::output::Aggregator;
use portal_harvest::state::StopReason;
use portal_harvest::{CompanyRecord, FetchError, FetchResult, PortalConfig, ProfileLink, RunContext};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const PORTAL: &str = "https://portal.test";

fn create_test_portal(workers: usize) -> PortalConfig {
    let toml = format!(
        r#"
[portals.memory]
engine = "requests"
base-url = "{PORTAL}"
search-path-template = "/search/{{sector}}/{{page}}"
max-pages = 10
delay-between-requests = 0
max-retries = 2
retry-base-delay = 1
workers = {workers}
page-timeout = 100
follow-website = false

[portals.memory.selectors]
company-profiles = "a.profile"
next-page = "a.next"
company-name = "h1"
company-address = ".address"
country = ".country"
website-links = "a.website"
"#
    );
    let mut config = parse_config(&toml).unwrap();
    config.portals.remove("memory").unwrap()
}

fn profile_html(id: usize) -> String {
    format!(
        r#"<html><body><h1>Firm {id}</h1><span class="country">FR</span>
           <a href="mailto:contact@firm{id}.fr">mail</a></body></html>"#
    )
}

fn link(path: &str) -> ProfileLink {
    ProfileLink::new(&Url::parse(&format!("{}{}", PORTAL, path)).unwrap(), 1).unwrap()
}

/// Counters shared between the factory and its sessions
#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    fetches: AtomicUsize,
}

/// Serves pages from a map; `/broken/` URLs time out, `/panic/` URLs panic
struct MemoryFactory {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<Counters>,
    refuse_sessions: bool,
}

impl MemoryFactory {
    fn new(pages: HashMap<String, String>) -> Self {
        Self {
            pages: Arc::new(pages),
            counters: Arc::new(Counters::default()),
            refuse_sessions: false,
        }
    }

    fn with_profiles(count: usize) -> Self {
        let pages = (1..=count)
            .map(|id| (format!("{}/firm/{}", PORTAL, id), profile_html(id)))
            .collect();
        Self::new(pages)
    }
}

#[async_trait]
impl SessionFactory for MemoryFactory {
    async fn open_session(&self) -> FetchResult<Box<dyn PageFetcher>> {
        if self.refuse_sessions {
            return Err(FetchError::Browser("no tabs left".to_string()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            pages: Arc::clone(&self.pages),
            counters: Arc::clone(&self.counters),
            current: None,
        }))
    }
}

struct MemorySession {
    pages: Arc<HashMap<String, String>>,
    counters: Arc<Counters>,
    current: Option<PageContent>,
}

#[async_trait]
impl PageFetcher for MemorySession {
    async fn fetch(&mut self, url: &str) -> FetchResult<PageContent> {
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(2)).await;
        self.counters.active.fetch_sub(1, Ordering::SeqCst);

        if url.contains("/panic/") {
            panic!("session crashed on {}", url);
        }

        match self.pages.get(url) {
            Some(html) if !url.contains("/broken/") => {
                let page = PageContent::new(url, html.clone());
                self.current = Some(page.clone());
                Ok(page)
            }
            _ => Err(FetchError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    async fn activate(&mut self, selector: &str) -> FetchResult<()> {
        Err(FetchError::ElementNotFound {
            selector: selector.to_string(),
        })
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> FetchResult<bool> {
        Ok(self
            .current
            .as_ref()
            .map_or(false, |page| page.has_match(selector)))
    }

    async fn current(&mut self) -> FetchResult<PageContent> {
        self.current
            .clone()
            .ok_or_else(|| FetchError::Unsupported("nothing loaded".to_string()))
    }

    async fn close(&mut self) -> FetchResult<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_hundred_links_with_seven_workers() {
    let factory = Arc::new(MemoryFactory::with_profiles(100));
    let counters = Arc::clone(&factory.counters);
    let ctx = Arc::new(RunContext::new("memory", "steel"));
    let links: Vec<ProfileLink> = (1..=100).map(|id| link(&format!("/firm/{}", id))).collect();

    let report = Coordinator::new(create_test_portal(7), EmailRules::default(), factory)
        .run(Arc::clone(&ctx), links.clone())
        .await;

    assert_eq!(report.workers_started, 7);
    assert_eq!(report.profiles_processed, 100);
    assert_eq!(report.left_in_queue, 0);
    assert_eq!(counters.opened.load(Ordering::SeqCst), 7);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 7);
    assert_eq!(counters.fetches.load(Ordering::SeqCst), 100);
    assert!(counters.max_active.load(Ordering::SeqCst) <= 7);

    let (records, skipped) = ctx.aggregator.finish(&links);
    assert_eq!(records.len(), 100);
    assert!(skipped.is_empty());
    for (id, record) in (1..=100).zip(&records) {
        assert_eq!(record.name.as_deref(), Some(format!("Firm {}", id).as_str()));
        assert_eq!(
            record.email.as_deref(),
            Some(format!("contact@firm{}.fr", id).as_str())
        );
        assert_eq!(record.country.as_deref(), Some("France"));
    }
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions() {
    let aggregator = Arc::new(Aggregator::new());
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..7 {
        let aggregator = Arc::clone(&aggregator);
        tasks.spawn(async move {
            let mut accepted = 0;
            for id in 0..50 {
                let url = format!("{}/firm/{}", PORTAL, id);
                if aggregator.submit(&url, CompanyRecord::new(url.clone())) {
                    accepted += 1;
                }
                tokio::task::yield_now().await;
            }
            accepted
        });
    }

    let mut accepted = 0;
    while let Some(result) = tasks.join_next().await {
        accepted += result.unwrap();
    }

    assert_eq!(accepted, 50);
    assert_eq!(aggregator.len(), 50);
}

#[tokio::test]
async fn test_failed_profiles_are_skipped() {
    let mut pages: HashMap<String, String> = (1..=7)
        .map(|id| (format!("{}/firm/{}", PORTAL, id), profile_html(id)))
        .collect();
    for id in 1..=3 {
        pages.insert(format!("{}/broken/{}", PORTAL, id), profile_html(id));
    }
    let factory = Arc::new(MemoryFactory::new(pages));
    let counters = Arc::clone(&factory.counters);
    let ctx = Arc::new(RunContext::new("memory", "steel"));

    let mut links: Vec<ProfileLink> = (1..=7).map(|id| link(&format!("/firm/{}", id))).collect();
    links.extend((1..=3).map(|id| link(&format!("/broken/{}", id))));

    let report = Coordinator::new(create_test_portal(4), EmailRules::default(), factory)
        .run(Arc::clone(&ctx), links.clone())
        .await;

    // skipped profiles count as processed
    assert_eq!(report.profiles_processed, 10);

    let (records, skipped) = ctx.aggregator.finish(&links);
    assert_eq!(records.len(), 7);
    assert_eq!(skipped.len(), 3);
    assert!(skipped
        .iter()
        .all(|s| s.url.contains("/broken/") && s.reason.contains("after 2 attempts")));
    // 7 good fetches plus 2 attempts for each broken profile
    assert_eq!(counters.fetches.load(Ordering::SeqCst), 13);
}

#[tokio::test]
async fn test_no_sessions_skips_everything() {
    let mut factory = MemoryFactory::with_profiles(5);
    factory.refuse_sessions = true;
    let ctx = Arc::new(RunContext::new("memory", "steel"));
    let links: Vec<ProfileLink> = (1..=5).map(|id| link(&format!("/firm/{}", id))).collect();

    let report = Coordinator::new(create_test_portal(3), EmailRules::default(), Arc::new(factory))
        .run(Arc::clone(&ctx), links.clone())
        .await;

    assert_eq!(report.workers_started, 0);
    assert_eq!(report.left_in_queue, 5);
    let (records, skipped) = ctx.aggregator.finish(&links);
    assert!(records.is_empty());
    assert_eq!(skipped.len(), 5);
    assert!(skipped
        .iter()
        .all(|s| s.reason == "no worker session available"));
}

#[tokio::test]
async fn test_cancellation_stops_new_work() {
    let factory = Arc::new(MemoryFactory::with_profiles(20));
    let counters = Arc::clone(&factory.counters);
    let ctx = Arc::new(RunContext::new("memory", "steel"));
    ctx.cancel.cancel();
    let links: Vec<ProfileLink> = (1..=20).map(|id| link(&format!("/firm/{}", id))).collect();

    let report = Coordinator::new(create_test_portal(7), EmailRules::default(), factory)
        .run(Arc::clone(&ctx), links.clone())
        .await;

    assert_eq!(report.profiles_processed, 0);
    assert_eq!(counters.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(
        counters.opened.load(Ordering::SeqCst),
        counters.closed.load(Ordering::SeqCst)
    );

    let (records, skipped) = ctx.aggregator.finish(&links);
    assert!(records.is_empty());
    assert_eq!(skipped.len(), 20);
    assert!(skipped.iter().all(|s| s.reason == "cancelled before visit"));
}

#[tokio::test]
async fn test_panicking_worker_does_not_stop_peers() {
    let mut pages: HashMap<String, String> = (1..=19)
        .map(|id| (format!("{}/firm/{}", PORTAL, id), profile_html(id)))
        .collect();
    pages.insert(format!("{}/panic/1", PORTAL), profile_html(0));
    let factory = Arc::new(MemoryFactory::new(pages));
    let ctx = Arc::new(RunContext::new("memory", "steel"));

    let mut links = vec![link("/panic/1")];
    links.extend((1..=19).map(|id| link(&format!("/firm/{}", id))));

    let counters = Arc::clone(&factory.counters);

    let report = Coordinator::new(create_test_portal(3), EmailRules::default(), factory)
        .run(Arc::clone(&ctx), links.clone())
        .await;

    assert_eq!(report.workers_started, 3);
    assert_eq!(report.profiles_processed, 20);
    assert_eq!(report.left_in_queue, 0);

    let (records, skipped) = ctx.aggregator.finish(&links);
    assert_eq!(records.len(), 19);
    assert_eq!(skipped.len(), 1);
    assert_eq!(records.len() + skipped.len(), links.len());
    assert!(skipped[0].url.ends_with("/panic/1"));
    assert_eq!(skipped[0].reason, "worker panicked");

    let opened = counters.opened.load(Ordering::SeqCst);
    assert_eq!(opened, 3);
    assert_eq!(counters.closed.load(Ordering::SeqCst), opened);
}

#[tokio::test]
async fn test_run_with_factory_builds_consistent_summary() {
    let mut pages: HashMap<String, String> = (1..=4)
        .map(|id| (format!("{}/firm/{}", PORTAL, id), profile_html(id)))
        .collect();
    pages.insert(
        format!("{}/search/steel/1", PORTAL),
        r#"<html><body>
            <a class="profile" href="/firm/1">1</a><a class="profile" href="/firm/2">2</a>
            <a class="next" href="/search/steel/2">next</a>
        </body></html>"#
            .to_string(),
    );
    pages.insert(
        format!("{}/search/steel/2", PORTAL),
        r#"<html><body>
            <a class="profile" href="/firm/2/">2</a><a class="profile" href="/firm/3">3</a>
            <a class="profile" href="/firm/4">4</a>
        </body></html>"#
            .to_string(),
    );
    let factory = Arc::new(MemoryFactory::new(pages));
    let counters = Arc::clone(&factory.counters);
    let ctx = Arc::new(RunContext::new("memory", "steel"));

    let outcome = run_with_factory(
        &create_test_portal(7),
        EmailRules::default(),
        factory,
        Arc::clone(&ctx),
    )
    .await
    .unwrap();

    let summary = &outcome.summary;
    assert_eq!(summary.pages_scraped, 2);
    assert_eq!(summary.stop_reason, Some(StopReason::NoNextPage));
    assert_eq!(summary.links_collected, 4);
    assert_eq!(summary.profiles_found, 4);
    assert!(summary.profiles_with_email <= summary.profiles_found);
    let country_total: usize = summary.countries.iter().map(|(_, n)| n).sum();
    assert_eq!(country_total, summary.profiles_found);
    assert_eq!(summary.countries, vec![("France".to_string(), 4)]);

    // one traversal session plus one per worker that had work
    assert_eq!(
        counters.opened.load(Ordering::SeqCst),
        counters.closed.load(Ordering::SeqCst)
    );
}
