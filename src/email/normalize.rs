//! Turning raw page text into syntactically valid, lowercase addresses

use once_cell::sync::Lazy;
use regex::Regex;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

static AT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*").unwrap());

static DOT_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[\[\(\{]\s*dot\s*[\]\)\}]\s*").unwrap());

static SPACED_AT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*@\s*").unwrap());

static SPACED_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)\s+\.\s+(\w)").unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").unwrap());

/// Extensions that show up after an `@` in asset names like `logo@2x.png`
const ASSET_TLDS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "css", "js", "json", "pdf", "woff",
    "woff2", "ttf", "mp4",
];

const TRIM_CHARS: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\'', '<', '>', '-', '*',
];

/// Undoes the usual tricks used to hide addresses from harvesters
///
/// Tags are removed, `[at]`/`(at)`/`{at}` become `@`, `[dot]`/`(dot)` become
/// `.`, and spaces around `@` or around free-standing dots are collapsed.
pub fn deobfuscate(raw: &str) -> String {
    let text = TAG.replace_all(raw, " ");
    let text = AT_TOKEN.replace_all(&text, "@");
    let text = DOT_TOKEN.replace_all(&text, ".");
    let text = SPACED_AT.replace_all(&text, "@");
    SPACED_DOT.replace_all(&text, "$1.$2").into_owned()
}

/// Finds every valid address in a raw span
pub fn extract_addresses(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let raw = strip_mailto(raw);
    let text = deobfuscate(raw);

    EMAIL
        .find_iter(&text)
        .filter_map(|m| normalize_address(m.as_str()))
        .collect()
}

/// Cleans one address candidate; returns `None` if it is not a valid address
///
/// Applying this to its own output returns the same value.
pub fn normalize_address(candidate: &str) -> Option<String> {
    let candidate = strip_mailto(candidate.trim());
    let candidate = candidate.split('?').next().unwrap_or_default();
    let address = candidate.trim_matches(TRIM_CHARS).to_lowercase();

    if is_valid_syntax(&address) {
        Some(address)
    } else {
        None
    }
}

fn strip_mailto(s: &str) -> &str {
    match s.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("mailto:") => &s[7..],
        _ => s,
    }
}

/// Checks the shape of a lowercase address
pub fn is_valid_syntax(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };

    if domain.contains('@') || local.is_empty() || local.len() > 64 {
        return false;
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }

    if !local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
    {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }

    for label in &labels {
        if label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return false;
        }
    }

    let tld = labels[labels.len() - 1];
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()) && !ASSET_TLDS.contains(&tld)
}
