//! Keyed record storage with date-range lookups.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::models::Record;
use crate::storage::{DateIndex, KeyValueBackend, get_typed, keys, put_typed};

/// Record store backed by a key-value backend and a date index.
///
/// The store is constructed explicitly and shared via `Arc`; the sync
/// engine writes through it and query consumers read from the same
/// instance.
pub struct RecordStore {
    backend: Arc<dyn KeyValueBackend>,
    index: DateIndex,
    /// Guards day-bucket read-modify-write across concurrent puts.
    index_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, index_ttl: Duration) -> Self {
        Self {
            index: DateIndex::new(Arc::clone(&backend), index_ttl),
            backend,
            index_lock: Mutex::new(()),
        }
    }

    /// Underlying backend, for components sharing the same storage.
    pub fn backend(&self) -> Arc<dyn KeyValueBackend> {
        Arc::clone(&self.backend)
    }

    pub fn index(&self) -> &DateIndex {
        &self.index
    }

    /// Fetch a record by id.
    pub async fn get(&self, id: &str) -> Result<Option<Record>> {
        get_typed(self.backend.as_ref(), &keys::record(id)).await
    }

    /// Store a record, replacing any previous value wholesale.
    ///
    /// The date index is moved along with the record: the id leaves its old
    /// day bucket when the date changed and joins (and refreshes) the new
    /// one.
    pub async fn put(&self, record: &Record) -> Result<()> {
        let now = Utc::now();
        let _guard = self.index_lock.lock().await;

        let previous_date = self.get(&record.id).await?.map(|r| r.date);
        put_typed(self.backend.as_ref(), &keys::record(&record.id), record).await?;

        if let Some(old) = previous_date.filter(|d| *d != record.date) {
            self.index.remove(old, &record.id, now).await?;
        }
        self.index.add(record.date, &record.id, now).await?;

        log::debug!("Stored record {} on {}", record.id, record.date);
        Ok(())
    }

    /// Records dated within `[start, end]`, newest first.
    ///
    /// Resolved day by day through the date index. Ids whose record can no
    /// longer be read, or whose record has moved out of the span, are
    /// skipped.
    pub async fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>> {
        if start > end {
            return Ok(Vec::new());
        }

        let ids = self.index.members_between(start, end, Utc::now()).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await? {
                Some(record) if record.date >= start && record.date <= end => records.push(record),
                Some(_) => log::debug!("Index entry for {} is stale, skipping", id),
                None => log::debug!("Indexed id {} has no record, skipping", id),
            }
        }

        records.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }
}
