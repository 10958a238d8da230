//! List-page traversal states
//!
//! The orchestrator moves through these while walking a portal's result pages.

use std::fmt;

/// Where the orchestrator is in its walk over list pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalState {
    /// Nothing fetched yet
    Idle,

    /// Loading list page `page`
    FetchingListPage { page: u32 },

    /// Reading profile links from the loaded page
    CollectingLinks { page: u32 },

    /// Moving from `page` to the next one
    AdvancingPage { page: u32 },

    /// `page` could not be loaded after all retries
    Failed { page: u32 },

    /// Traversal is over
    Done(StopReason),
}

/// Why traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// The configured page limit was reached
    MaxPagesReached,

    /// The last page had no `next-page` control
    NoNextPage,

    /// Consecutive pages added no new profile links
    Stagnated,

    /// The click on `next-page` did not load new results
    NavigationFailed,

    /// The run was cancelled
    Cancelled,
}

impl TraversalState {
    /// Returns true once no further list pages will be visited
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// The list page this state refers to, if any
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::FetchingListPage { page }
            | Self::CollectingLinks { page }
            | Self::AdvancingPage { page }
            | Self::Failed { page } => Some(*page),
            Self::Idle | Self::Done(_) => None,
        }
    }
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxPagesReached => "max_pages_reached",
            Self::NoNextPage => "no_next_page",
            Self::Stagnated => "no_new_links",
            Self::NavigationFailed => "navigation_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TraversalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingListPage { page } => write!(f, "fetching list page {}", page),
            Self::CollectingLinks { page } => write!(f, "collecting links on page {}", page),
            Self::AdvancingPage { page } => write!(f, "advancing from page {}", page),
            Self::Failed { page } => write!(f, "page {} failed", page),
            Self::Done(reason) => write!(f, "done ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_done_is_terminal() {
        assert!(!TraversalState::Idle.is_terminal());
        assert!(!TraversalState::FetchingListPage { page: 1 }.is_terminal());
        assert!(!TraversalState::Failed { page: 2 }.is_terminal());
        assert!(TraversalState::Done(StopReason::NoNextPage).is_terminal());
    }

    #[test]
    fn test_page_accessor() {
        assert_eq!(TraversalState::CollectingLinks { page: 3 }.page(), Some(3));
        assert_eq!(TraversalState::Done(StopReason::Cancelled).page(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TraversalState::Done(StopReason::MaxPagesReached).to_string(),
            "done (max_pages_reached)"
        );
    }
}
