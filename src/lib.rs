//! Portal-Harvest: a configuration-driven company directory harvester
//!
//! This crate walks the paginated search results of B2B directory portals,
//! visits every company profile it finds and extracts name, address, country,
//! website and the most business-like email address. Everything portal-specific
//! (URL templates, pagination style, CSS selectors) lives in configuration.

pub mod config;
pub mod crawler;
pub mod email;
pub mod output;
pub mod record;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Portal-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        source: FetchError,
    },

    #[error("First list page {url} could not be scraped: {reason}")]
    FirstPageFailed { url: String, reason: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a page fetcher session
///
/// Transient variants are retried by the retry policy; everything else
/// surfaces to the caller straight away.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("No element matches selector '{selector}'")]
    ElementNotFound { selector: String },

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Unsupported by this fetcher: {0}")]
    Unsupported(String),
}

impl FetchError {
    /// Returns true if another attempt might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ElementNotFound { .. } | Self::Transport { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Browser(_) | Self::Unsupported(_) => false,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector for '{field}': {selector}")]
    InvalidSelector { field: String, selector: String },

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown portal '{name}' (configured: {available})")]
    UnknownPortal { name: String, available: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Portal-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for page fetcher operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::{Config, PortalConfig, RunOptions};
pub use record::{CompanyRecord, EmailSource, ProfileLink};
pub use state::{RunContext, TraversalState};
pub use url::{extract_domain, normalize_url};
