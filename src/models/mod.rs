// src/models/mod.rs

//! Domain models for the sync core.
//!
//! This module contains all data structures used throughout the crate,
//! organized by their primary purpose.

mod artifact;
mod config;
mod record;

// Re-export all public types
pub use artifact::{Artifact, Chunk, RelevantChunk};
pub use config::{
    BackendKind, ChunkingConfig, Config, ListingGuardConfig, LoggingConfig, RelevanceConfig,
    MAX_WINDOW_DAYS, SourceConfig, StorageConfig, SyncConfig,
};
pub use record::{AttachmentRef, Candidate, Record};
