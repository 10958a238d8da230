//! Output handler traits and types
//!
//! This module defines the trait interface for sinks and the bundle of
//! results handed to them at the end of a run.

use crate::output::summary::ScrapeSummary;
use crate::record::{CompanyRecord, ProfileLink, SkippedProfile};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Everything a finished run produced
#[derive(Debug, Clone, Copy)]
pub struct RunOutput<'a> {
    /// Deduplicated profile links in discovery order
    pub links: &'a [ProfileLink],

    /// Harvested records in link order
    pub records: &'a [CompanyRecord],

    pub skipped: &'a [SkippedProfile],

    pub summary: &'a ScrapeSummary,
}

impl RunOutput<'_> {
    /// Records that carry an email address
    pub fn records_with_email(&self) -> impl Iterator<Item = &CompanyRecord> {
        self.records.iter().filter(|r| r.has_email())
    }
}

/// Trait for output sinks
///
/// A sink receives the complete results of one run after the worker pool has
/// drained. Implementations must be usable from any thread.
pub trait OutputHandler: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Persists the results of a run
    fn write_run(&self, run: &RunOutput<'_>) -> OutputResult<()>;
}
