//! URL handling module for Portal-Harvest
//!
//! This module provides profile-key normalization, website domain helpers and
//! the domain patterns used by the email denylist.

mod domain;
mod matcher;
mod normalize;

pub use domain::{extract_domain, same_site, website_domain};
pub use matcher::{matches_wildcard, DomainPattern};
pub use normalize::normalize_url;

use url::Url;

/// Resolves an `href` found on `base` into an absolute HTTP(S) URL
///
/// Fragment-only links, `javascript:`, `mailto:` and `tel:` targets yield
/// `None`.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
    {
        return None;
    }

    let resolved = base.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved),
        _ => None,
    }
}
