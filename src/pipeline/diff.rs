//! Change detection between a polled listing and stored revision markers.
//!
//! Candidates are partitioned into new, changed and unchanged. A marker
//! that is missing or blank on either side counts as changed, so any doubt
//! leads to a re-fetch rather than to stale data.

use std::collections::{HashMap, HashSet};

use crate::models::{Candidate, Record};

/// Stored revision marker per id; `None` means stored without a marker.
pub type StoredMarkers = HashMap<String, Option<String>>;

/// Partition of one listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Not in the store
    pub new: Vec<Candidate>,
    /// Stored under a different or unusable marker
    pub changed: Vec<Candidate>,
    /// Stored under the same marker
    pub unchanged: Vec<Candidate>,
}

impl ChangeSet {
    /// Check if there is anything to fetch.
    pub fn has_changes(&self) -> bool {
        !self.new.is_empty() || !self.changed.is_empty()
    }

    /// Number of candidates needing a detail fetch.
    pub fn change_count(&self) -> usize {
        self.new.len() + self.changed.len()
    }

    /// Candidates to fetch, new ones first.
    pub fn into_fetch_list(self) -> Vec<Candidate> {
        let mut fetch = self.new;
        fetch.extend(self.changed);
        fetch
    }
}

/// Partition candidates against stored markers.
///
/// Pure: duplicate candidate ids are collapsed with the first occurrence
/// winning, and listing order is preserved within each set.
pub fn detect_changes(candidates: &[Candidate], stored: &StoredMarkers) -> ChangeSet {
    let mut seen = HashSet::new();
    let mut changes = ChangeSet::default();

    for candidate in candidates {
        if !seen.insert(candidate.id.as_str()) {
            log::debug!("Duplicate listing entry for {}, keeping the first", candidate.id);
            continue;
        }

        match stored.get(&candidate.id) {
            None => changes.new.push(candidate.clone()),
            Some(stored_marker) => {
                let listed = usable(candidate.revision.as_deref());
                let stored_marker = usable(stored_marker.as_deref());
                match (listed, stored_marker) {
                    (Some(a), Some(b)) if a == b => changes.unchanged.push(candidate.clone()),
                    _ => changes.changed.push(candidate.clone()),
                }
            }
        }
    }

    changes
}

/// Stored markers of a set of records.
pub fn markers_of<'a>(records: impl IntoIterator<Item = &'a Record>) -> StoredMarkers {
    records
        .into_iter()
        .map(|r| (r.id.clone(), r.revision.clone()))
        .collect()
}

/// Ids stored in the window that the listing no longer mentions.
pub fn missing_from_listing(candidates: &[Candidate], window: &[Record]) -> Vec<String> {
    let listed: HashSet<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
    window
        .iter()
        .filter(|r| !listed.contains(r.id.as_str()))
        .map(|r| r.id.clone())
        .collect()
}

fn usable(marker: Option<&str>) -> Option<&str> {
    marker.map(str::trim).filter(|m| !m.is_empty())
}
