//! Secondary index from calendar day to record ids.
//!
//! Each day bucket is one key (`index/YYYY-MM-DD`) holding the member ids
//! and an expiry that is pushed forward on every addition. An expired
//! bucket reads as empty, so range queries over old days degrade to "no
//! results" instead of scanning.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{KeyValueBackend, get_typed, keys, put_typed};

/// `YYYY-MM-DD` bucket key for a date.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Stored value of one day bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateIndexEntry {
    pub ids: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
}

impl DateIndexEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Day-bucketed id index over a key-value backend.
///
/// Mutations are read-modify-write on a shared bucket; callers that write
/// concurrently must serialise them (the record store does).
#[derive(Clone)]
pub struct DateIndex {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl DateIndex {
    pub fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Load a bucket, treating an expired one as absent.
    async fn load(&self, day: NaiveDate, now: DateTime<Utc>) -> Result<Option<DateIndexEntry>> {
        let entry: Option<DateIndexEntry> =
            get_typed(self.backend.as_ref(), &keys::index(day)).await?;
        Ok(entry.filter(|e| !e.is_expired(now)))
    }

    /// Add an id to a day bucket and refresh the bucket's expiry.
    pub async fn add(&self, day: NaiveDate, id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut entry = self.load(day, now).await?.unwrap_or_else(|| DateIndexEntry {
            ids: BTreeSet::new(),
            expires_at: now,
        });
        entry.ids.insert(id.to_string());
        entry.expires_at = now + self.ttl;
        put_typed(self.backend.as_ref(), &keys::index(day), &entry).await
    }

    /// Remove an id from a day bucket, deleting the bucket once empty.
    pub async fn remove(&self, day: NaiveDate, id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(mut entry) = self.load(day, now).await? else {
            return Ok(());
        };
        if !entry.ids.remove(id) {
            return Ok(());
        }
        if entry.ids.is_empty() {
            self.backend.delete(&keys::index(day)).await
        } else {
            put_typed(self.backend.as_ref(), &keys::index(day), &entry).await
        }
    }

    /// Ids filed under one day.
    pub async fn members(&self, day: NaiveDate, now: DateTime<Utc>) -> Result<BTreeSet<String>> {
        Ok(self.load(day, now).await?.map(|e| e.ids).unwrap_or_default())
    }

    /// Union of ids over every day in the inclusive span.
    pub async fn members_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        for day in start.iter_days().take_while(|d| *d <= end) {
            ids.extend(self.members(day, now).await?);
        }
        Ok(ids)
    }
}
