//! One poll → diff → fetch → store cycle.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{Candidate, MAX_WINDOW_DAYS, Record, SyncConfig};
use crate::pipeline::diff::{detect_changes, markers_of, missing_from_listing};
use crate::pipeline::guard::ListingGuard;
use crate::services::{DetailFetcher, ListingSource};
use crate::storage::RecordStore;

/// Summary of one sync cycle.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub listed: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Drives sync cycles against a listing source and a record store.
pub struct SyncEngine {
    listing: Arc<dyn ListingSource>,
    fetcher: DetailFetcher,
    store: Arc<RecordStore>,
    guard: ListingGuard,
    window_days: u32,
}

impl SyncEngine {
    pub fn new(
        listing: Arc<dyn ListingSource>,
        fetcher: DetailFetcher,
        store: Arc<RecordStore>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            listing,
            fetcher,
            store,
            guard: ListingGuard::with_config(config.guard.clone()),
            window_days: config.window_days.clamp(1, MAX_WINDOW_DAYS),
        }
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Inclusive date window ending on `today`.
    fn window(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = today
            .checked_sub_days(Days::new(u64::from(self.window_days) - 1))
            .unwrap_or(NaiveDate::MIN);
        (start, today)
    }

    /// Run a single cycle.
    ///
    /// A listing failure or a storage failure aborts the cycle. Records
    /// stored before an abort stay stored; failed ids are retried by the
    /// next cycle because their stored marker is still stale.
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        log::info!("Sync cycle started");

        let candidates = self.listing.list_candidates().await?;

        let (start, end) = self.window(started_at.date_naive());
        let window = self.store.range(start, end).await?;
        self.guard
            .validate(candidates.len(), guard_baseline(&candidates, &window))?;

        let mut stored = markers_of(&window);
        for candidate in &candidates {
            if !stored.contains_key(&candidate.id) {
                // Outside the window is not the same as absent.
                if let Some(record) = self.store.get(&candidate.id).await? {
                    stored.insert(record.id, record.revision);
                }
            }
        }

        let changes = detect_changes(&candidates, &stored);
        let (new, changed, unchanged) = (
            changes.new.len(),
            changes.changed.len(),
            changes.unchanged.len(),
        );

        for id in missing_from_listing(&candidates, &window) {
            log::debug!("{} is no longer listed; keeping the stored record", id);
        }

        let to_fetch: Vec<Candidate> = changes.into_fetch_list();
        let outcome = self.fetcher.fetch_all(to_fetch).await?;

        let report = SyncReport {
            started_at,
            finished_at: Utc::now(),
            listed: candidates.len(),
            new,
            changed,
            unchanged,
            stored: outcome.stored.len(),
            failed: outcome.detail_failures,
        };
        log::info!(
            "Sync cycle finished: {} listed, {} new, {} changed, {} unchanged, {} stored, {} failed",
            report.listed,
            report.new,
            report.changed,
            report.unchanged,
            report.stored,
            report.failed
        );
        Ok(report)
    }
}

/// Stored records the listing is expected to still cover.
///
/// Only records dated on or after the listing's oldest item count, so a
/// source that lists a short recent span is not compared with the whole
/// window. Undated candidates take the date of their stored record. With
/// no date to go on, the whole window is the baseline.
fn guard_baseline(candidates: &[Candidate], window: &[Record]) -> usize {
    let stored_dates: HashMap<&str, NaiveDate> =
        window.iter().map(|r| (r.id.as_str(), r.date)).collect();
    let oldest = candidates
        .iter()
        .filter_map(|c| c.date.or_else(|| stored_dates.get(c.id.as_str()).copied()))
        .min();

    match oldest {
        Some(oldest) => window.iter().filter(|r| r.date >= oldest).count(),
        None => window.len(),
    }
}
