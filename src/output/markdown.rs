//! Markdown summary generation
//!
//! This module writes a human-readable report of a harvest run: timing,
//! traversal outcome, email coverage, country frequency and notable cases.

use crate::output::summary::{format_duration, ScrapeSummary};
use crate::output::traits::{OutputHandler, OutputResult, RunOutput};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Companies listed per notable-case section
const NOTABLE_LIMIT: usize = 10;

/// Sink writing the summary report to a markdown file
#[derive(Debug, Clone)]
pub struct MarkdownOutputHandler {
    path: PathBuf,
}

impl MarkdownOutputHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputHandler for MarkdownOutputHandler {
    fn name(&self) -> &str {
        "markdown"
    }

    fn write_run(&self, run: &RunOutput<'_>) -> OutputResult<()> {
        generate_markdown_summary(run.summary, &self.path)
    }
}

/// Writes the markdown summary to `output_path`
pub fn generate_markdown_summary(summary: &ScrapeSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &ScrapeSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Harvest Summary: {} / {}\n\n",
        summary.portal, summary.sector
    ));

    md.push_str("## Run Information\n\n");
    md.push_str(&format!(
        "- **Start Time**: {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    md.push_str(&format!(
        "- **End Time**: {}\n",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S")
    ));
    md.push_str(&format!(
        "- **Duration**: {}\n",
        format_duration(summary.duration())
    ));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Traversal\n\n");
    md.push_str(&format!(
        "Scraped {} pages and found {} company profiles.\n\n",
        summary.pages_scraped, summary.links_collected
    ));
    if let Some(reason) = summary.stop_reason {
        md.push_str(&format!("- **Stop Reason**: {}\n", reason));
    }
    if summary.lost_pages.is_empty() {
        md.push_str("- **Lost Pages**: none\n\n");
    } else {
        let pages: Vec<String> = summary.lost_pages.iter().map(|p| p.to_string()).collect();
        md.push_str(&format!("- **Lost Pages**: {}\n\n", pages.join(", ")));
    }

    md.push_str("## Final Statistics\n\n");
    md.push_str(&format!(
        "- **Profiles Harvested**: {}\n",
        summary.profiles_found
    ));
    md.push_str(&format!("- **Profiles Skipped**: {}\n", summary.skipped));
    md.push_str(&format!(
        "- **Companies With Email**: {} / {} ({:.1}%)\n\n",
        summary.profiles_with_email,
        summary.profiles_found,
        summary.email_rate()
    ));

    if !summary.email_sources.is_empty() {
        md.push_str("| Email Source | Count |\n");
        md.push_str("|--------------|-------|\n");
        for (source, count) in &summary.email_sources {
            md.push_str(&format!("| {} | {} |\n", source, count));
        }
        md.push('\n');
    }

    md.push_str("## Country Frequency\n\n");
    if summary.countries.is_empty() {
        md.push_str("No country data available.\n\n");
    } else {
        for (country, count) in &summary.countries {
            md.push_str(&format!("- {}: {}\n", country, count));
        }
        md.push('\n');
    }

    md.push_str("## Notable Cases\n\n");
    push_notable(
        &mut md,
        "Companies with no website link",
        &summary.no_website,
    );
    push_notable(
        &mut md,
        "Companies with no email found on their site",
        &summary.no_email_found,
    );

    md.push_str("---\n\n");
    md.push_str("*Generated by Portal-Harvest*\n");

    md
}

fn push_notable(md: &mut String, title: &str, names: &[String]) {
    md.push_str(&format!("### {}: {}\n\n", title, names.len()));
    for name in names.iter().take(NOTABLE_LIMIT) {
        md.push_str(&format!("- {}\n", name));
    }
    if names.len() > NOTABLE_LIMIT {
        md.push_str("- ...\n");
    }
    if !names.is_empty() {
        md.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EmailSource;
    use crate::state::StopReason;
    use tempfile::TempDir;

    fn create_test_summary() -> ScrapeSummary {
        let mut summary = ScrapeSummary {
            portal: "europages".to_string(),
            sector: "packaging".to_string(),
            pages_scraped: 4,
            lost_pages: vec![2],
            stop_reason: Some(StopReason::MaxPagesReached),
            links_collected: 40,
            profiles_found: 38,
            profiles_with_email: 19,
            skipped: 2,
            countries: vec![("Germany".to_string(), 30), ("Unknown".to_string(), 8)],
            no_website: (0..12).map(|i| format!("Firm {}", i)).collect(),
            config_hash: Some("abc123".to_string()),
            ..ScrapeSummary::default()
        };
        summary.email_sources.insert(EmailSource::ProfilePage, 19);
        summary.email_sources.insert(EmailSource::NotFound, 19);
        summary
    }

    #[test]
    fn test_format_markdown_summary() {
        let md = format_markdown_summary(&create_test_summary());

        assert!(md.contains("# Harvest Summary: europages / packaging"));
        assert!(md.contains("Scraped 4 pages and found 40 company profiles."));
        assert!(md.contains("- **Lost Pages**: 2"));
        assert!(md.contains("- **Companies With Email**: 19 / 38 (50.0%)"));
        assert!(md.contains("- Germany: 30"));
        assert!(md.contains("| profile_page | 19 |"));
        assert!(md.contains("- **Config Hash**: abc123"));
    }

    #[test]
    fn test_notable_cases_truncated() {
        let md = format_markdown_summary(&create_test_summary());
        assert!(md.contains("### Companies with no website link: 12"));
        assert!(md.contains("- Firm 9\n"));
        assert!(!md.contains("- Firm 10\n"));
        assert!(md.contains("- ...\n"));
    }

    #[test]
    fn test_generate_markdown_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("summary.md");

        generate_markdown_summary(&create_test_summary(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Harvest Summary"));
    }
}
