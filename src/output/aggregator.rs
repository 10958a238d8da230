//! Thread-safe collection point for records produced by the workers

use crate::record::{CompanyRecord, ProfileLink, SkippedProfile};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Collects records keyed by normalized profile URL
///
/// Workers submit concurrently; the first record for a profile wins and later
/// submissions for the same key are ignored.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Mutex<HashMap<String, CompanyRecord>>,
    skipped: Mutex<Vec<SkippedProfile>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record; returns false if `key` was already present
    pub fn submit(&self, key: &str, record: CompanyRecord) -> bool {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if records.contains_key(key) {
            debug!("Ignoring duplicate record for {}", key);
            return false;
        }
        records.insert(key.to_string(), record);
        true
    }

    pub fn record_skip(&self, url: impl Into<String>, reason: impl Into<String>) {
        self.skipped
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SkippedProfile {
                url: url.into(),
                reason: reason.into(),
            });
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the collected records in link order, plus the skipped profiles
    ///
    /// Skipped profiles are also returned in link order; skips for URLs that
    /// are not in `links` come last.
    pub fn finish(&self, links: &[ProfileLink]) -> (Vec<CompanyRecord>, Vec<SkippedProfile>) {
        let mut records = std::mem::take(
            &mut *self.records.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let mut skipped = std::mem::take(
            &mut *self.skipped.lock().unwrap_or_else(PoisonError::into_inner),
        );

        let mut ordered = Vec::with_capacity(records.len());
        for link in links {
            if let Some(record) = records.remove(&link.key) {
                ordered.push(record);
            }
        }

        let mut leftovers: Vec<(String, CompanyRecord)> = records.into_iter().collect();
        leftovers.sort_by(|a, b| a.0.cmp(&b.0));
        ordered.extend(leftovers.into_iter().map(|(_, record)| record));

        let position: HashMap<&str, usize> = links
            .iter()
            .enumerate()
            .map(|(i, link)| (link.url.as_str(), i))
            .collect();
        skipped.sort_by_key(|s| position.get(s.url.as_str()).copied().unwrap_or(usize::MAX));

        (ordered, skipped)
    }
}
