use crate::ConfigError;

/// A domain pattern used by the email denylist
///
/// Three forms are understood:
/// 1. Exact: "example.com" matches only "example.com"
/// 2. Subdomain wildcard: "*.example.com" matches "example.com" and any subdomain
/// 3. Any-TLD wildcard: "test.*" matches "test.com", "test.de", "test.co.uk"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainPattern {
    Exact(String),
    Subdomains(String),
    AnyTld(String),
}

impl DomainPattern {
    /// Parses a pattern; input is lowercased
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        crate::config::validate_domain_pattern(pattern)?;
        let pattern = pattern.to_lowercase();

        Ok(if let Some(base) = pattern.strip_prefix("*.") {
            Self::Subdomains(base.to_string())
        } else if let Some(label) = pattern.strip_suffix(".*") {
            Self::AnyTld(label.to_string())
        } else {
            Self::Exact(pattern)
        })
    }

    /// Checks a lowercase domain against the pattern
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(domain) => candidate == domain,
            Self::Subdomains(base) => matches_wildcard(base, candidate),
            Self::AnyTld(label) => candidate
                .strip_prefix(label.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .map_or(false, |tld| !tld.is_empty()),
        }
    }
}

/// Checks if a domain is `base` itself or one of its subdomains
///
/// # Examples
///
/// ```
/// use portal_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("example.com", "api.v2.example.com"));
/// assert!(!matches_wildcard("example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(base: &str, candidate: &str) -> bool {
    candidate == base || candidate.ends_with(&format!(".{}", base))
}
