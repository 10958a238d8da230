//! Run summary built from the final record set

use crate::crawler::TraversalReport;
use crate::record::{CompanyRecord, EmailSource, SkippedProfile};
use crate::state::{RunContext, StopReason};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

/// Statistics of one harvest run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeSummary {
    pub portal: String,
    pub sector: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// List pages that loaded and had their links collected
    pub pages_scraped: u32,

    /// List pages given up on after retries
    pub lost_pages: Vec<u32>,

    pub stop_reason: Option<StopReason>,

    /// Unique profile links found during traversal
    pub links_collected: usize,

    /// Records produced by the coordinator
    pub profiles_found: usize,

    pub profiles_with_email: usize,

    /// Profiles that could not be fetched
    pub skipped: usize,

    /// Country label to record count, most frequent first
    pub countries: Vec<(String, usize)>,

    pub email_sources: BTreeMap<EmailSource, usize>,

    /// Companies whose profile shows no website
    pub no_website: Vec<String>,

    /// Companies with a website but no usable email anywhere
    pub no_email_found: Vec<String>,

    pub config_hash: Option<String>,
}

impl ScrapeSummary {
    /// Computes the summary of a finished run
    ///
    /// The result depends only on its inputs; records are expected in link order.
    pub fn build(
        ctx: &RunContext,
        traversal: &TraversalReport,
        records: &[CompanyRecord],
        skipped: &[SkippedProfile],
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut country_counts: HashMap<&str, usize> = HashMap::new();
        let mut email_sources = BTreeMap::new();
        let mut no_website = Vec::new();
        let mut no_email_found = Vec::new();

        for record in records {
            *country_counts.entry(record.country_label()).or_insert(0) += 1;
            *email_sources.entry(record.email_source).or_insert(0) += 1;

            match (&record.website, &record.email) {
                (None, _) => no_website.push(record.display_name().to_string()),
                (Some(_), None) => no_email_found.push(record.display_name().to_string()),
                (Some(_), Some(_)) => {}
            }
        }

        let mut countries: Vec<(String, usize)> = country_counts
            .into_iter()
            .map(|(country, count)| (country.to_string(), count))
            .collect();
        countries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self {
            portal: ctx.portal.clone(),
            sector: ctx.sector.clone(),
            started_at: ctx.started_at,
            finished_at,
            pages_scraped: traversal.pages_scraped,
            lost_pages: traversal.lost_pages.clone(),
            stop_reason: Some(traversal.stop_reason),
            links_collected: ctx.link_count(),
            profiles_found: records.len(),
            profiles_with_email: records.iter().filter(|r| r.has_email()).count(),
            skipped: skipped.len(),
            countries,
            email_sources,
            no_website,
            no_email_found,
            config_hash: None,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Share of found profiles that carry an email, in percent
    pub fn email_rate(&self) -> f64 {
        if self.profiles_found == 0 {
            return 0.0;
        }
        (self.profiles_with_email as f64 / self.profiles_found as f64) * 100.0
    }
}

/// Formats a duration as `H:MM:SS`
pub fn format_duration(duration: chrono::Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Prints the summary to stdout
pub fn print_summary(summary: &ScrapeSummary) {
    println!("=== Harvest Summary: {} / {} ===\n", summary.portal, summary.sector);

    println!("Overview:");
    println!("  Duration: {}", format_duration(summary.duration()));
    println!("  Pages scraped: {}", summary.pages_scraped);
    if !summary.lost_pages.is_empty() {
        println!("  Lost pages: {:?}", summary.lost_pages);
    }
    if let Some(reason) = summary.stop_reason {
        println!("  Stopped because: {}", reason);
    }
    println!("  Profile links: {}", summary.links_collected);
    println!("  Profiles harvested: {}", summary.profiles_found);
    println!("  Profiles skipped: {}", summary.skipped);
    println!(
        "  With email: {} / {} ({:.1}%)",
        summary.profiles_with_email,
        summary.profiles_found,
        summary.email_rate()
    );
    println!();

    if !summary.countries.is_empty() {
        println!("Countries:");
        for (country, count) in &summary.countries {
            println!("  {}: {}", country, count);
        }
        println!();
    }

    println!("Email sources:");
    for (source, count) in &summary.email_sources {
        println!("  {}: {}", source, count);
    }
}
