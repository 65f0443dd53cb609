// src/services/relevance.rs

//! Lexical relevance selection over cached chunks.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::models::{Chunk, RelevantChunk};
use crate::services::artifacts::ArtifactPipeline;

/// Distinct lowercase query terms longer than two characters, in order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .unicode_words()
        .map(str::to_lowercase)
        .filter(|term| term.chars().count() > 2)
        .filter(|term| seen.insert(term.clone()))
        .collect()
}

/// Number of distinct terms occurring in the text, case-insensitively.
pub fn score(text: &str, terms: &[String]) -> usize {
    let haystack = text.to_lowercase();
    terms.iter().filter(|t| haystack.contains(t.as_str())).count()
}

/// Rank chunks of several attachments against a set of terms.
///
/// Input order defines the tie-break: earlier attachments first, then by
/// chunk sequence.
pub fn rank(
    per_attachment: Vec<(String, Vec<Chunk>)>,
    terms: &[String],
    limit: usize,
) -> Vec<RelevantChunk> {
    let mut scored: Vec<RelevantChunk> = per_attachment
        .into_iter()
        .flat_map(|(attachment_id, mut chunks)| {
            chunks.sort_by_key(|c| c.sequence);
            chunks.into_iter().map(move |chunk| RelevantChunk {
                attachment_id: attachment_id.clone(),
                score: score(&chunk.text, terms),
                chunk,
            })
        })
        .filter(|c| c.score > 0)
        .collect();

    // Stable sort keeps (attachment, sequence) order among equal scores.
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Selects the chunks most relevant to a query from a set of attachments.
pub struct RelevanceSelector {
    pipeline: Arc<ArtifactPipeline>,
    concurrency: usize,
}

impl RelevanceSelector {
    pub fn new(pipeline: Arc<ArtifactPipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Top `limit` chunks by distinct-term overlap.
    ///
    /// Attachments without chunks (unavailable or unreadable) contribute
    /// nothing. Only storage failures are errors.
    pub async fn select(
        &self,
        attachment_ids: &[String],
        query: &str,
        limit: usize,
    ) -> Result<Vec<RelevantChunk>> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let ids: Vec<&String> = attachment_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .collect();

        let mut resolved = stream::iter(ids)
            .map(|id| async move { (id, self.pipeline.chunks_for(id).await) })
            .buffered(self.concurrency);

        let mut per_attachment = Vec::new();
        while let Some((id, result)) = resolved.next().await {
            match result? {
                Some(chunks) => per_attachment.push((id.clone(), chunks)),
                None => log::debug!("No chunks for attachment {}, skipping", id),
            }
        }

        let selected = rank(per_attachment, &terms, limit);
        log::debug!(
            "Selected {} chunks for {} terms across {} attachments",
            selected.len(),
            terms.len(),
            seen.len()
        );
        Ok(selected)
    }
}
