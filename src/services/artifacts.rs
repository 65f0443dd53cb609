// src/services/artifacts.rs

//! Lazy attachment → text → chunks pipeline with a create-once cache.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::models::{Artifact, Chunk, ChunkingConfig};
use crate::services::chunker::Chunker;
use crate::services::extract::{SniffingExtractor, TextExtractor, extract_blocking};
use crate::services::source::AttachmentSource;
use crate::storage::ArtifactCache;

/// Outcome of resolving one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// Chunks are available, from cache or freshly built.
    Ready(Artifact),
    /// The attachment could not be retrieved.
    Unavailable,
    /// The attachment was retrieved but no text could be read from it.
    Unreadable,
}

impl ArtifactStatus {
    pub fn into_chunks(self) -> Option<Vec<Chunk>> {
        match self {
            ArtifactStatus::Ready(artifact) => Some(artifact.chunks),
            _ => None,
        }
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactStatus::Ready(a) => write!(f, "ready ({} chunks)", a.chunks.len()),
            ArtifactStatus::Unavailable => write!(f, "unavailable"),
            ArtifactStatus::Unreadable => write!(f, "unreadable"),
        }
    }
}

/// Fetches, extracts, chunks and caches attachments on demand.
///
/// Failures are not cached, so an unavailable attachment is retried on the
/// next request. Only storage errors are returned as errors.
pub struct ArtifactPipeline {
    source: Arc<dyn AttachmentSource>,
    extractor: Arc<dyn TextExtractor>,
    cache: ArtifactCache,
    chunker: Chunker,
}

impl ArtifactPipeline {
    pub fn new(
        source: Arc<dyn AttachmentSource>,
        cache: ArtifactCache,
        chunking: &ChunkingConfig,
    ) -> Self {
        Self {
            source,
            extractor: Arc::new(SniffingExtractor),
            cache,
            chunker: Chunker::new(chunking),
        }
    }

    /// Replace the text extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Make sure an attachment has cached chunks, building them on a miss.
    pub async fn resolve(&self, attachment_id: &str) -> Result<ArtifactStatus> {
        if let Some(artifact) = self.cache.get(attachment_id).await? {
            log::debug!("Artifact cache hit for {}", attachment_id);
            return Ok(ArtifactStatus::Ready(artifact));
        }

        let Some(bytes) = self.source.fetch_attachment(attachment_id).await else {
            log::warn!("Attachment {} is unavailable", attachment_id);
            return Ok(ArtifactStatus::Unavailable);
        };
        let source_digest = hex::encode(Sha256::digest(&bytes));

        let text = match extract_blocking(Arc::clone(&self.extractor), attachment_id, bytes).await {
            Ok(text) => text,
            Err(e) => {
                log::warn!("{}", e);
                return Ok(ArtifactStatus::Unreadable);
            }
        };

        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            log::warn!("Attachment {} produced no chunks", attachment_id);
            return Ok(ArtifactStatus::Unreadable);
        }

        let artifact = Artifact {
            attachment_id: attachment_id.to_string(),
            source_digest,
            chunks,
            created_at: Utc::now(),
        };
        self.cache.put(&artifact).await?;
        log::info!(
            "Cached {} chunks for attachment {}",
            artifact.chunks.len(),
            attachment_id
        );
        Ok(ArtifactStatus::Ready(artifact))
    }

    /// Chunks for an attachment, or None when it cannot be produced now.
    pub async fn chunks_for(&self, attachment_id: &str) -> Result<Option<Vec<Chunk>>> {
        Ok(self.resolve(attachment_id).await?.into_chunks())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::storage::LocalBackend;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory attachment source counting fetches.
    #[derive(Default)]
    pub(crate) struct FakeAttachments {
        pub files: HashMap<String, Vec<u8>>,
        pub fetches: AtomicUsize,
    }

    impl FakeAttachments {
        pub fn with(files: &[(&str, &str)]) -> Self {
            Self {
                files: files
                    .iter()
                    .map(|(id, body)| (id.to_string(), body.as_bytes().to_vec()))
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AttachmentSource for FakeAttachments {
        async fn fetch_attachment(&self, attachment_id: &str) -> Option<Vec<u8>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.files.get(attachment_id).cloned()
        }
    }

    fn pipeline(source: Arc<FakeAttachments>) -> (ArtifactPipeline, ArtifactCache) {
        let cache = ArtifactCache::new(Arc::new(LocalBackend::in_memory()));
        let pipeline = ArtifactPipeline::new(source, cache.clone(), &ChunkingConfig::new(100, 20));
        (pipeline, cache)
    }

    #[tokio::test]
    async fn test_miss_builds_and_caches() {
        let source = Arc::new(FakeAttachments::with(&[("a", "Budget notes for the year.")]));
        let (pipeline, cache) = pipeline(Arc::clone(&source));

        let status = pipeline.resolve("a").await.unwrap();
        let ArtifactStatus::Ready(artifact) = status else {
            panic!("expected ready, got {status}");
        };
        assert_eq!(artifact.chunks.len(), 1);
        assert_eq!(artifact.chunks[0].text, "Budget notes for the year.");
        assert_eq!(
            artifact.source_digest,
            hex::encode(Sha256::digest(b"Budget notes for the year."))
        );
        assert_eq!(cache.get("a").await.unwrap(), Some(artifact));
    }

    #[tokio::test]
    async fn test_hit_bypasses_fetch() {
        let source = Arc::new(FakeAttachments::with(&[("a", "Some text")]));
        let (pipeline, _) = pipeline(Arc::clone(&source));

        let first = pipeline.chunks_for("a").await.unwrap();
        let second = pipeline.chunks_for("a").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_attachment_is_unavailable_and_not_cached() {
        let source = Arc::new(FakeAttachments::default());
        let (pipeline, cache) = pipeline(Arc::clone(&source));

        assert_eq!(
            pipeline.resolve("gone").await.unwrap(),
            ArtifactStatus::Unavailable
        );
        assert!(pipeline.chunks_for("gone").await.unwrap().is_none());
        assert!(cache.get("gone").await.unwrap().is_none());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreadable_attachment_is_distinct() {
        let source = Arc::new(FakeAttachments::with(&[("bin", "\0\0\0")]));
        let (pipeline, cache) = pipeline(source);

        assert_eq!(
            pipeline.resolve("bin").await.unwrap(),
            ArtifactStatus::Unreadable
        );
        assert!(cache.get("bin").await.unwrap().is_none());
    }
}
