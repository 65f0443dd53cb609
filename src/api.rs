// src/api.rs

//! Read/query facade over the record store and the artifact pipeline.
//!
//! Absence is an ordinary answer here: a missing record, an unavailable
//! attachment or an empty selection all come back as `None` or an empty
//! list. Only storage outages are errors.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{Chunk, Record, RelevantChunk};
use crate::services::{ArtifactPipeline, RelevanceSelector};
use crate::storage::RecordStore;

/// Query interface handed to consumers.
#[derive(Clone)]
pub struct QueryApi {
    store: Arc<RecordStore>,
    pipeline: Arc<ArtifactPipeline>,
    selector: Arc<RelevanceSelector>,
    default_limit: usize,
}

impl QueryApi {
    pub fn new(
        store: Arc<RecordStore>,
        pipeline: Arc<ArtifactPipeline>,
        selector: Arc<RelevanceSelector>,
        default_limit: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            selector,
            default_limit,
        }
    }

    pub async fn get_record(&self, id: &str) -> Result<Option<Record>> {
        self.store.get(id).await
    }

    /// Records dated within `[start, end]`, newest first.
    pub async fn get_records_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Record>> {
        self.store.range(start, end).await
    }

    /// Cached chunks of an attachment, building them on first request.
    pub async fn get_chunks_for_attachment(&self, attachment_id: &str) -> Result<Option<Vec<Chunk>>> {
        self.pipeline.chunks_for(attachment_id).await
    }

    /// Chunks most relevant to `query`, at most `limit` (or the default).
    pub async fn get_relevant_chunks(
        &self,
        attachment_ids: &[String],
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RelevantChunk>> {
        let limit = limit.unwrap_or(self.default_limit);
        self.selector.select(attachment_ids, query, limit).await
    }
}
