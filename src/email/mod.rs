//! Email normalization, filtering and ranking
//!
//! Raw spans from a page (mailto targets, element text, whole-page text) go in;
//! a ranked list of business-relevant addresses comes out. The result depends
//! only on the set of spans, never on their order.

mod normalize;
mod score;

pub use normalize::{deobfuscate, extract_addresses, is_valid_syntax, normalize_address};
pub use score::{EmailRules, MIN_SCORE};

use std::cmp::Ordering;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::trace;

/// Why a candidate was rejected; logged and otherwise ignored
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("'{0}' is not a valid address")]
    Syntax(String),

    #[error("domain of '{0}' is denylisted")]
    Denylisted(String),

    #[error("'{address}' scored {score}, below the minimum")]
    LowScore { address: String, score: i32 },
}

/// One scored address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailCandidate {
    pub address: String,
    pub score: i32,
}

impl EmailCandidate {
    pub fn domain(&self) -> &str {
        self.address
            .split_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }
}

impl Ord for EmailCandidate {
    /// Best first: higher score, then shorter address, then lexicographic
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.address.len().cmp(&other.address.len()))
            .then_with(|| self.address.cmp(&other.address))
    }
}

impl PartialOrd for EmailCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scores a single normalized address against the rules
pub fn evaluate(
    address: &str,
    rules: &EmailRules,
    website: Option<&str>,
) -> Result<EmailCandidate, EmailError> {
    if !is_valid_syntax(address) {
        return Err(EmailError::Syntax(address.to_string()));
    }

    let domain = address.split_once('@').map(|(_, d)| d).unwrap_or_default();
    if rules.is_denied(domain) {
        return Err(EmailError::Denylisted(address.to_string()));
    }

    let score = rules.score(address, website);
    if score < MIN_SCORE {
        return Err(EmailError::LowScore {
            address: address.to_string(),
            score,
        });
    }

    Ok(EmailCandidate {
        address: address.to_string(),
        score,
    })
}

/// Ranks every acceptable address found in `spans`, best first
///
/// `website` is the company website's domain, used for the same-site bonus.
pub fn rank_emails<S: AsRef<str>>(
    spans: &[S],
    rules: &EmailRules,
    website: Option<&str>,
) -> Vec<EmailCandidate> {
    let addresses: BTreeSet<String> = spans
        .iter()
        .flat_map(|span| extract_addresses(span.as_ref()))
        .collect();

    let addresses = drop_numeric_prefix_artifacts(addresses);

    let mut ranked: Vec<EmailCandidate> = addresses
        .iter()
        .filter_map(|address| match evaluate(address, rules, website) {
            Ok(candidate) => Some(candidate),
            Err(e) => {
                trace!("Discarding email candidate: {}", e);
                None
            }
        })
        .collect();

    ranked.sort();
    ranked
}

/// The single best address in `spans`, if any survives filtering
pub fn best_email<S: AsRef<str>>(
    spans: &[S],
    rules: &EmailRules,
    website: Option<&str>,
) -> Option<String> {
    rank_emails(spans, rules, website)
        .into_iter()
        .next()
        .map(|c| c.address)
}

/// Removes `123info@acme.de` when `info@acme.de` was also found
///
/// Such addresses come from phone numbers running into the address text.
fn drop_numeric_prefix_artifacts(addresses: BTreeSet<String>) -> BTreeSet<String> {
    let artifacts: Vec<String> = addresses
        .iter()
        .filter(|candidate| {
            let Some((local, domain)) = candidate.split_once('@') else {
                return false;
            };
            addresses.iter().any(|other| {
                other
                    .split_once('@')
                    .filter(|(other_local, other_domain)| {
                        *other_domain == domain && local.len() > other_local.len()
                    })
                    .and_then(|(other_local, _)| local.strip_suffix(other_local))
                    .map_or(false, |prefix| prefix.chars().all(|c| c.is_ascii_digit()))
            })
        })
        .cloned()
        .collect();

    let mut addresses = addresses;
    for artifact in artifacts {
        trace!("Dropping parsing artefact {}", artifact);
        addresses.remove(&artifact);
    }
    addresses
}
