use crate::output::Aggregator;
use crate::record::{LinkSet, ProfileLink};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// State shared by every stage of one harvest run
///
/// Created when the run starts and handed by reference to the orchestrator,
/// the coordinator and the summary builder.
#[derive(Debug)]
pub struct RunContext {
    pub portal: String,
    pub sector: String,
    pub started_at: DateTime<Utc>,
    pub cancel: CancellationToken,
    pub aggregator: Aggregator,
    links: Mutex<LinkSet>,
}

impl RunContext {
    pub fn new(portal: impl Into<String>, sector: impl Into<String>) -> Self {
        Self::with_cancel(portal, sector, CancellationToken::new())
    }

    /// Creates a context driven by an externally owned cancellation token
    pub fn with_cancel(
        portal: impl Into<String>,
        sector: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            portal: portal.into(),
            sector: sector.into(),
            started_at: Utc::now(),
            cancel,
            aggregator: Aggregator::new(),
            links: Mutex::new(LinkSet::new()),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Merges links into the run's set; returns how many were new
    pub fn merge_links(&self, links: Vec<ProfileLink>) -> usize {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(links)
    }

    pub fn link_count(&self) -> usize {
        self.links.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Copy of the collected links in discovery order
    pub fn links(&self) -> Vec<ProfileLink> {
        self.links
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}
