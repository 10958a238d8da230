//! Record types flowing from traversal to the sinks

mod country;

pub use country::{expand_country, UNKNOWN_COUNTRY};

use crate::url::normalize_url;
use crate::UrlResult;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// A company profile link found on a list page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileLink {
    /// Absolute URL as found on the list page
    pub url: String,
    /// Normalized form, used for deduplication
    pub key: String,
    /// List page the link was first seen on (1-based)
    pub page: u32,
}

impl ProfileLink {
    pub fn new(url: &Url, page: u32) -> UrlResult<Self> {
        Ok(Self {
            url: url.to_string(),
            key: normalize_url(url.as_str())?.to_string(),
            page,
        })
    }
}

/// Ordered set of profile links, unique by normalized URL
#[derive(Debug, Default, Clone)]
pub struct LinkSet {
    links: Vec<ProfileLink>,
    seen: HashSet<String>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a link; returns false if its normalized URL is already present
    pub fn insert(&mut self, link: ProfileLink) -> bool {
        if !self.seen.insert(link.key.clone()) {
            return false;
        }
        self.links.push(link);
        true
    }

    /// Adds every link and returns how many were new
    pub fn merge<I: IntoIterator<Item = ProfileLink>>(&mut self, links: I) -> usize {
        links.into_iter().filter(|link| self.insert(link.clone())).count()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links in the order they were first found
    pub fn iter(&self) -> impl Iterator<Item = &ProfileLink> {
        self.links.iter()
    }
}

/// Where a record's email was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EmailSource {
    ProfilePage,
    WebsiteHome,
    ContactPage,
    NotFound,
}

impl EmailSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfilePage => "profile_page",
            Self::WebsiteHome => "website_home",
            Self::ContactPage => "contact_page",
            Self::NotFound => "not_found",
        }
    }
}

impl std::fmt::Display for EmailSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One harvested company
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyRecord {
    pub name: Option<String>,
    pub country: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    /// Best ranked address; always valid and not denylisted
    pub email: Option<String>,
    pub email_source: EmailSource,
    /// Every accepted address, best first
    pub all_emails: Vec<String>,
    pub profile_url: String,
}

impl CompanyRecord {
    pub fn new(profile_url: impl Into<String>) -> Self {
        Self {
            name: None,
            country: None,
            address: None,
            website: None,
            email: None,
            email_source: EmailSource::NotFound,
            all_emails: Vec::new(),
            profile_url: profile_url.into(),
        }
    }

    pub fn has_email(&self) -> bool {
        self.email.is_some()
    }

    /// Country used for statistics; `Unknown` when absent
    pub fn country_label(&self) -> &str {
        self.country.as_deref().unwrap_or(UNKNOWN_COUNTRY)
    }

    /// Name used in reports; falls back to the profile URL
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.profile_url)
    }

    /// Stores ranked addresses; the first becomes the record's email
    pub fn set_emails(&mut self, ranked: Vec<String>, source: EmailSource) {
        self.email = ranked.first().cloned();
        self.email_source = if self.email.is_some() {
            source
        } else {
            EmailSource::NotFound
        };
        self.all_emails = ranked;
    }
}

/// A profile that could not be harvested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedProfile {
    pub url: String,
    pub reason: String,
}

static NAME_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(company|business|enterprise):\s*").unwrap());

static NAME_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*-\s*(company|business|enterprise)$").unwrap());

static PIPE_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\|.*$").unwrap());

/// Strips labels and site titles that profile pages wrap around a company name
///
/// ```
/// use portal_harvest::record::clean_company_name;
///
/// assert_eq!(
///     clean_company_name("Company:  Acme   GmbH | Europages").as_deref(),
///     Some("Acme GmbH")
/// );
/// ```
pub fn clean_company_name(raw: &str) -> Option<String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = NAME_PREFIX.replace(&name, "");
    let name = NAME_SUFFIX.replace(&name, "");
    let name = PIPE_TAIL.replace(&name, "");
    let name = name.trim();

    if name.is_empty() || name.eq_ignore_ascii_case("unknown") || name.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(name.to_string())
    }
}
