//! List page traversal
//!
//! The orchestrator walks a portal's search results one page at a time on a
//! single session, merging the profile links of every page into the run's
//! link set. It is a small state machine over [`TraversalState`]:
//!
//! ```text
//! Idle -> FetchingListPage -> CollectingLinks -> AdvancingPage -> FetchingListPage ...
//!                 |                   |
//!                 v                   v
//!               Failed              Done
//! ```
//!
//! A page that cannot be loaded after all retries is recorded as lost and the
//! walk moves on, except for page 1, whose loss ends the run.

use crate::config::{PaginationStyle, PortalConfig};
use crate::crawler::fetcher::{PageContent, PageFetcher};
use crate::crawler::parser::parse_list_page;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::Pacer;
use crate::record::ProfileLink;
use crate::state::{RunContext, StopReason, TraversalState};
use crate::{FetchError, HarvestError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between checks while a clicked page is loading
const CLICK_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Outcome of a finished traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalReport {
    /// List pages whose links were collected
    pub pages_scraped: u32,
    /// List pages lost after all retries, in visiting order
    pub lost_pages: Vec<u32>,
    pub stop_reason: StopReason,
}

/// Walks the list pages of one portal and sector
pub struct Orchestrator<'a> {
    portal: &'a PortalConfig,
    ctx: &'a RunContext,
    retry: RetryPolicy,
    pacer: Pacer,
    state: TraversalState,
}

impl<'a> Orchestrator<'a> {
    pub fn new(portal: &'a PortalConfig, ctx: &'a RunContext) -> Self {
        Self {
            portal,
            ctx,
            retry: RetryPolicy::from_portal(portal),
            pacer: Pacer::new(portal.request_delay()),
            state: TraversalState::Idle,
        }
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    fn transition(&mut self, next: TraversalState) {
        debug!("Traversal: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs the traversal to completion on `session`
    ///
    /// Returns an error only when page 1 cannot be scraped; every other
    /// failure is reflected in the report.
    pub async fn run(
        &mut self,
        session: &mut dyn PageFetcher,
    ) -> Result<TraversalReport, HarvestError> {
        let mut pages_scraped = 0;
        let mut lost_pages = Vec::new();
        let mut pages_without_new = 0;
        let mut previous_keys: Vec<String> = Vec::new();
        let mut loaded: Option<PageContent> = None;
        // Set once a click has already brought the next page into the session
        let mut preloaded = false;

        self.transition(TraversalState::FetchingListPage { page: 1 });

        loop {
            if self.ctx.is_cancelled() && !self.state.is_terminal() {
                info!("Traversal cancelled");
                self.transition(TraversalState::Done(StopReason::Cancelled));
            }

            match self.state {
                TraversalState::Idle => {
                    self.transition(TraversalState::FetchingListPage { page: 1 });
                }

                TraversalState::FetchingListPage { page } => {
                    let url = self.portal.list_url(&self.ctx.sector, page);
                    let navigate = if preloaded { None } else { Some(url.as_str()) };

                    match self.load_list_page(session, page, navigate).await {
                        Ok(content) => {
                            loaded = Some(content);
                            self.transition(TraversalState::CollectingLinks { page });
                        }
                        Err(HarvestError::Cancelled) => {
                            self.transition(TraversalState::Done(StopReason::Cancelled));
                        }
                        Err(e) if page == 1 => {
                            return Err(HarvestError::FirstPageFailed {
                                url,
                                reason: e.to_string(),
                            });
                        }
                        Err(e) => {
                            warn!("Lost list page {}: {}", page, e);
                            lost_pages.push(page);
                            self.transition(TraversalState::Failed { page });
                        }
                    }
                    preloaded = false;
                }

                TraversalState::CollectingLinks { page } => {
                    let Some(content) = loaded.take() else {
                        self.transition(TraversalState::Failed { page });
                        continue;
                    };

                    let list = parse_list_page(&content, &self.portal.selectors);
                    let links: Vec<ProfileLink> = list
                        .links
                        .iter()
                        .filter_map(|url| ProfileLink::new(url, page).ok())
                        .collect();
                    previous_keys = links.iter().map(|l| l.key.clone()).collect();

                    let found = links.len();
                    let new = self.ctx.merge_links(links);
                    pages_scraped += 1;
                    info!(
                        "Page {}: {} profile links ({} new, {} total)",
                        page,
                        found,
                        new,
                        self.ctx.link_count()
                    );

                    if new == 0 {
                        pages_without_new += 1;
                    } else {
                        pages_without_new = 0;
                    }

                    let next = if page >= self.portal.max_pages {
                        TraversalState::Done(StopReason::MaxPagesReached)
                    } else if !list.has_next {
                        TraversalState::Done(StopReason::NoNextPage)
                    } else if pages_without_new >= self.portal.stagnation_limit {
                        TraversalState::Done(StopReason::Stagnated)
                    } else {
                        TraversalState::AdvancingPage { page }
                    };
                    self.transition(next);
                }

                TraversalState::Failed { page } => {
                    let next = if page >= self.portal.max_pages {
                        TraversalState::Done(StopReason::MaxPagesReached)
                    } else {
                        TraversalState::AdvancingPage { page }
                    };
                    self.transition(next);
                }

                TraversalState::AdvancingPage { page } => match self.portal.pagination {
                    PaginationStyle::UrlTemplate => {
                        self.transition(TraversalState::FetchingListPage { page: page + 1 });
                    }
                    PaginationStyle::Click => {
                        match self.advance_by_click(session, page, &previous_keys).await {
                            Ok(()) => {
                                preloaded = true;
                                self.transition(TraversalState::FetchingListPage {
                                    page: page + 1,
                                });
                            }
                            Err(HarvestError::Cancelled) => {
                                self.transition(TraversalState::Done(StopReason::Cancelled));
                            }
                            Err(e) => {
                                warn!("Could not advance past page {}: {}", page, e);
                                self.transition(TraversalState::Done(
                                    StopReason::NavigationFailed,
                                ));
                            }
                        }
                    }
                },

                TraversalState::Done(stop_reason) => {
                    info!(
                        "Traversal finished after {} pages ({}), {} lost",
                        pages_scraped,
                        stop_reason,
                        lost_pages.len()
                    );
                    return Ok(TraversalReport {
                        pages_scraped,
                        lost_pages,
                        stop_reason,
                    });
                }
            }
        }
    }

    /// Loads a list page and waits until it shows profile links
    ///
    /// With `navigate` set the session goes to that URL first; otherwise the
    /// page already in the session is read. Every navigating attempt,
    /// retries included, waits for its pacing turn.
    async fn load_list_page(
        &mut self,
        session: &mut dyn PageFetcher,
        page: u32,
        navigate: Option<&str>,
    ) -> Result<PageContent, HarvestError> {
        let operation = format!("list page {}", page);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if navigate.is_some() && !self.pacer.wait_turn(&self.ctx.cancel).await {
                return Err(HarvestError::Cancelled);
            }
            match self.try_load_list_page(session, navigate).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    self.retry
                        .backoff(&operation, attempt, e, &self.ctx.cancel)
                        .await?
                }
            }
        }
    }

    async fn try_load_list_page(
        &self,
        session: &mut dyn PageFetcher,
        navigate: Option<&str>,
    ) -> Result<PageContent, FetchError> {
        if let Some(url) = navigate {
            session.fetch(url).await?;
        }

        if let Err(e) = session.dismiss_overlays().await {
            debug!("Overlay dismissal failed: {}", e);
        }

        let selector = &self.portal.selectors.company_profiles;
        if !session.wait_for(selector, self.portal.page_timeout()).await? {
            return Err(FetchError::ElementNotFound {
                selector: selector.clone(),
            });
        }

        session.current().await
    }

    /// Clicks `next-page` and waits for the result list to change
    ///
    /// Each click is paced like a list page fetch.
    async fn advance_by_click(
        &mut self,
        session: &mut dyn PageFetcher,
        page: u32,
        previous_keys: &[String],
    ) -> Result<(), HarvestError> {
        let operation = format!("next-page click after page {}", page);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.pacer.wait_turn(&self.ctx.cancel).await {
                return Err(HarvestError::Cancelled);
            }
            match self.try_click_next(session, previous_keys).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    self.retry
                        .backoff(&operation, attempt, e, &self.ctx.cancel)
                        .await?
                }
            }
        }
    }

    async fn try_click_next(
        &self,
        session: &mut dyn PageFetcher,
        previous_keys: &[String],
    ) -> Result<(), FetchError> {
        session.activate(&self.portal.selectors.next_page).await?;

        let deadline = Instant::now() + self.portal.page_timeout();
        loop {
            let content = session.current().await?;
            if self.list_keys(&content) != previous_keys {
                return Ok(());
            }
            if Instant::now() >= deadline {
                let url = content.url;
                return Err(FetchError::Timeout { url });
            }
            tokio::time::sleep(CLICK_POLL_INTERVAL).await;
        }
    }

    fn list_keys(&self, content: &PageContent) -> Vec<String> {
        parse_list_page(content, &self.portal.selectors)
            .links
            .iter()
            .filter_map(|url| ProfileLink::new(url, 0).ok())
            .map(|link| link.key)
            .collect()
    }
}
