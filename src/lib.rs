// src/lib.rs

//! pollsync: keeps a local record cache in sync with a poll-only source,
//! and turns record attachments into cached, queryable text chunks.

pub mod api;
#[cfg(feature = "s3")]
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod utils;

pub use api::QueryApi;
pub use runtime::Runtime;
