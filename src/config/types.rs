use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Main configuration structure for Portal-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Portal definitions keyed by portal name
    pub portals: BTreeMap<String, PortalConfig>,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which page fetcher implementation a portal needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Headless Chromium session, for JavaScript-rendered portals
    #[serde(alias = "selenium")]
    Browser,
    /// Plain HTTP requests, for server-rendered portals
    Requests,
}

/// How the crawler moves from one result page to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationStyle {
    /// The page number is substituted into the search path template
    #[default]
    UrlTemplate,
    /// The "next" control is clicked inside a live session
    Click,
}

/// A single portal definition
#[derive(Debug, Clone, Deserialize)]
pub struct PortalConfig {
    pub engine: Engine,

    /// Scheme and host of the portal (e.g. "https://www.europages.co.uk")
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search path appended to the base URL; `{sector}` and `{page}` are substituted
    #[serde(rename = "search-path-template")]
    pub search_path_template: String,

    #[serde(default)]
    pub pagination: PaginationStyle,

    pub selectors: SelectorSet,

    /// Maximum number of list pages to visit
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Minimum time between two list page fetches (milliseconds)
    #[serde(rename = "delay-between-requests", default = "default_delay")]
    pub delay_between_requests: u64,

    /// Attempts per fetch before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay; doubles on each further attempt (milliseconds)
    #[serde(rename = "retry-base-delay", default = "default_retry_base_delay")]
    pub retry_base_delay: u64,

    /// Number of concurrent profile workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Bound on navigation, element waits and click settling (milliseconds)
    #[serde(rename = "page-timeout", default = "default_page_timeout")]
    pub page_timeout: u64,

    /// Selector of the cookie consent "accept" button, if the portal shows one
    #[serde(rename = "cookie-banner", default)]
    pub cookie_banner: Option<String>,

    /// Selector of a button that reveals the website link when clicked
    #[serde(rename = "website-button", default)]
    pub website_button: Option<String>,

    /// Look for emails on the company website when the profile has none
    #[serde(rename = "follow-website", default = "default_true")]
    pub follow_website: bool,

    /// Consecutive pages without new links before traversal stops
    #[serde(rename = "stagnation-limit", default = "default_stagnation_limit")]
    pub stagnation_limit: u32,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// The seven named selectors a portal must provide
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorSet {
    /// Anchors on a list page pointing at company profiles
    #[serde(rename = "company-profiles")]
    pub company_profiles: String,

    /// The "next page" link or button on a list page
    #[serde(rename = "next-page")]
    pub next_page: String,

    #[serde(rename = "company-name")]
    pub company_name: String,

    #[serde(rename = "company-address")]
    pub company_address: String,

    pub country: String,

    #[serde(rename = "website-links")]
    pub website_links: String,

    /// Elements on a profile page that may hold email addresses
    #[serde(rename = "email-containers", default = "default_email_containers")]
    pub email_containers: String,
}

impl SelectorSet {
    /// Returns every selector with its configuration key
    pub fn named(&self) -> [(&'static str, &str); 7] {
        [
            ("company-profiles", &self.company_profiles),
            ("next-page", &self.next_page),
            ("company-name", &self.company_name),
            ("company-address", &self.company_address),
            ("country", &self.country),
            ("website-links", &self.website_links),
            ("email-containers", &self.email_containers),
        ]
    }
}

/// Email filtering configuration, merged with the built-in lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    /// Extra domain patterns to reject ("example.com", "*.example.com", "test.*")
    #[serde(default)]
    pub denylist: Vec<String>,

    /// Extra local-part tokens that mark a generic company mailbox
    #[serde(rename = "business-prefixes", default)]
    pub business_prefixes: Vec<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the database and the summary report
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

/// Per-run values supplied on the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub portal: String,
    pub sector: String,
    pub max_pages: Option<u32>,
    pub workers: Option<usize>,
    pub headless: bool,
}

impl RunOptions {
    pub fn new(portal: impl Into<String>, sector: impl Into<String>) -> Self {
        Self {
            portal: portal.into(),
            sector: sector.into(),
            max_pages: None,
            workers: None,
            headless: true,
        }
    }
}

impl PortalConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.delay_between_requests)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay)
    }

    /// Builds the URL of a list page
    ///
    /// The sector is form-encoded before substitution. Templates without a
    /// `{page}` placeholder (click-driven portals) yield the same URL for
    /// every page.
    pub fn list_url(&self, sector: &str, page: u32) -> String {
        let sector: String =
            url::form_urlencoded::byte_serialize(sector.trim().as_bytes()).collect();
        let path = self
            .search_path_template
            .replace("{sector}", &sector)
            .replace("{page}", &page.to_string());

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn default_max_pages() -> u32 {
    10
}

fn default_delay() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1000
}

fn default_workers() -> usize {
    7
}

fn default_page_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_stagnation_limit() -> u32 {
    1
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_email_containers() -> String {
    "a[href^='mailto:']".to_string()
}

fn default_output_dir() -> String {
    "data".to_string()
}
