//! Service layer for the sync core.
//!
//! This module contains the business logic for:
//! - Polling the source (`HttpSource` and the source traits)
//! - Tolerant payload parsing (`parse`)
//! - Detail fetching (`DetailFetcher`)
//! - The attachment artifact pipeline (`ArtifactPipeline`)
//! - Lexical relevance selection (`RelevanceSelector`)

pub mod artifacts;
pub mod attachments;
pub mod chunker;
pub mod extract;
pub mod fetcher;
pub mod parse;
pub mod relevance;
pub mod source;

pub use artifacts::{ArtifactPipeline, ArtifactStatus};
pub use chunker::{Chunker, chunk};
pub use extract::{SniffingExtractor, TextExtractor};
pub use fetcher::{DetailFetcher, FetchOutcome};
pub use relevance::RelevanceSelector;
pub use source::{AttachmentSource, DetailSource, HttpSource, ListingSource};
