//! Chunked text artifacts derived from attachments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded span of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its artifact
    pub sequence: usize,

    pub text: String,

    /// Target size the chunk was built for (characters)
    pub target_size: usize,

    /// Characters carried over from the end of the previous chunk
    pub overlap: usize,
}

/// The cached, immutable result of processing one attachment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub attachment_id: String,

    /// SHA-256 of the binary the chunks were extracted from
    pub source_digest: String,

    pub chunks: Vec<Chunk>,

    pub created_at: DateTime<Utc>,
}

/// A chunk selected for a query, with its origin and score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelevantChunk {
    pub attachment_id: String,

    /// Number of distinct query terms found in the chunk
    pub score: usize,

    pub chunk: Chunk,
}
