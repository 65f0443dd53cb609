// src/error.rs

//! Unified error handling for the sync core.
//!
//! Per-item failures (a single detail fetch, a single attachment) are
//! contained by their callers and only logged. The variants that reach the
//! top of a sync cycle are [`AppError::Listing`] and
//! [`AppError::StoreUnavailable`].

use std::fmt;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The candidate listing could not be obtained; the cycle is aborted.
    #[error("Listing failed: {0}")]
    Listing(String),

    /// A single detail payload could not be fetched.
    #[error("Detail fetch failed for {id}: {message}")]
    DetailFetch { id: String, message: String },

    /// An attachment was retrieved but no text could be read from it.
    #[error("Extraction failed for attachment {attachment_id}: {message}")]
    Extraction {
        attachment_id: String,
        message: String,
    },

    /// The storage backend is unreachable or rejected a write.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a listing failure.
    pub fn listing(message: impl fmt::Display) -> Self {
        Self::Listing(message.to_string())
    }

    /// Create a per-id detail fetch failure.
    pub fn detail(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::DetailFetch {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create an extraction failure for an attachment.
    pub fn extraction(attachment_id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            attachment_id: attachment_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a store outage error.
    pub fn store(message: impl fmt::Display) -> Self {
        Self::StoreUnavailable(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error must abort the current sync cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Listing(_) | Self::StoreUnavailable(_))
    }
}
