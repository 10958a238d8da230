//! Output module: record aggregation, run summaries and sinks
//!
//! This module handles:
//! - Collecting worker results without duplicates
//! - Building the run summary from the final record set
//! - Writing results to the SQLite database and the markdown report

mod aggregator;
mod markdown;
mod sqlite_output;
pub mod summary;
mod traits;

pub use aggregator::Aggregator;
pub use markdown::{format_markdown_summary, generate_markdown_summary, MarkdownOutputHandler};
pub use sqlite_output::SqliteOutputHandler;
pub use summary::{print_summary, ScrapeSummary};
pub use traits::{OutputError, OutputHandler, OutputResult, RunOutput};

use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File-name-safe form of a portal or sector name
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();

    let mut collapsed = String::with_capacity(stem.len());
    for c in stem.chars() {
        if c == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(c);
    }
    collapsed.trim_matches('_').to_string()
}

/// Paths of the database and the summary report for a portal and sector
pub fn output_paths(output_dir: &Path, portal: &str, sector: &str) -> (PathBuf, PathBuf) {
    let suffix = format!("{}_{}", file_stem(portal), file_stem(sector));
    (
        output_dir.join(format!("harvest_{}.db", suffix)),
        output_dir.join(format!("summary_{}.md", suffix)),
    )
}

/// Opens the standard sinks, creating `output_dir` if needed
pub fn default_sinks(
    output_dir: &Path,
    portal: &str,
    sector: &str,
) -> OutputResult<Vec<Box<dyn OutputHandler>>> {
    std::fs::create_dir_all(output_dir)?;
    let (db_path, summary_path) = output_paths(output_dir, portal, sector);

    Ok(vec![
        Box::new(SqliteOutputHandler::open(&db_path)?),
        Box::new(MarkdownOutputHandler::new(summary_path)),
    ])
}

/// Hands a finished run to every sink
///
/// All sinks are attempted; the first failure is returned after the rest ran.
pub fn write_outputs(sinks: &[Box<dyn OutputHandler>], run: &RunOutput<'_>) -> OutputResult<()> {
    let mut first_error = None;

    for sink in sinks {
        match sink.write_run(run) {
            Ok(()) => info!("Wrote {} output", sink.name()),
            Err(e) => {
                warn!("Failed to write {} output: {}", sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
