// src/services/fetcher.rs

//! Detail fetcher service.
//!
//! Fetches full payloads for new and changed ids concurrently and persists
//! each record as soon as it is parsed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Candidate, SourceConfig};
use crate::services::parse::{key_by_download_url, parse_record};
use crate::services::source::DetailSource;
use crate::storage::RecordStore;

/// Summary of a detail fetch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Ids stored this run, in completion order
    pub stored: Vec<String>,
    pub detail_total: usize,
    pub detail_failures: usize,
}

/// Service fetching and persisting detail payloads.
pub struct DetailFetcher {
    source: Arc<dyn DetailSource>,
    store: Arc<RecordStore>,
    concurrency: usize,
    delay: Duration,
    /// No attachment URL template, so payload URLs identify attachments
    key_attachments_by_url: bool,
}

impl DetailFetcher {
    pub fn new(source: Arc<dyn DetailSource>, store: Arc<RecordStore>, config: &SourceConfig) -> Self {
        Self {
            source,
            store,
            concurrency: config.max_concurrent.max(1),
            delay: Duration::from_millis(config.request_delay_ms),
            key_attachments_by_url: config.attachment_url.trim().is_empty(),
        }
    }

    /// Fetch and store every candidate.
    ///
    /// A failed fetch is logged and counted; the id keeps its old revision
    /// marker and is retried on the next cycle. A storage failure aborts
    /// the run, leaving already stored records in place.
    pub async fn fetch_all(&self, candidates: Vec<Candidate>) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome {
            detail_total: candidates.len(),
            ..FetchOutcome::default()
        };

        let mut detail_stream = stream::iter(candidates)
            .map(|candidate| async move {
                let result = self.source.fetch_detail(&candidate.id).await;
                (candidate, result, Utc::now())
            })
            .buffer_unordered(self.concurrency);

        while let Some((candidate, result, retrieved_at)) = detail_stream.next().await {
            match result {
                Ok(payload) => {
                    let mut record = parse_record(&candidate, &payload, retrieved_at);
                    if self.key_attachments_by_url {
                        record.attachments = key_by_download_url(record.attachments);
                    }
                    self.store.put(&record).await?;
                    outcome.stored.push(record.id);
                }
                Err(error) => {
                    outcome.detail_failures += 1;
                    log::warn!("Skipping {} this cycle: {}", candidate.id, error);
                }
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        Ok(outcome)
    }
}
