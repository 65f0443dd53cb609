//! Storage abstractions for records, the date index and artifacts.
//!
//! Everything is persisted through a [`KeyValueBackend`] holding JSON
//! values. Two interchangeable backends exist: [`LocalBackend`] (memory
//! with an optional snapshot file) and `S3Backend` (feature `s3`).
//!
//! ## Key Layout
//!
//! ```text
//! records/{id}            # Record JSON
//! index/YYYY-MM-DD        # { ids, expires_at } day bucket
//! artifacts/{id}          # Artifact JSON (immutable once written)
//! ```

pub mod artifacts;
pub mod date_index;
pub mod local;
pub mod records;
#[cfg(feature = "s3")]
pub mod s3;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::Result;
use crate::models::{BackendKind, StorageConfig};

// Re-export for convenience
pub use artifacts::ArtifactCache;
pub use date_index::{DateIndex, DateIndexEntry, day_key};
pub use local::LocalBackend;
pub use records::RecordStore;

/// Trait for key-value storage backends.
///
/// Implementations must give read-after-write consistency within one
/// process. Transport or outage errors are reported as
/// [`AppError::StoreUnavailable`](crate::error::AppError::StoreUnavailable).
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Read a value, returning None if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write a value, replacing any previous one.
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Open the backend selected by configuration.
pub async fn open_backend(config: &StorageConfig) -> Result<Arc<dyn KeyValueBackend>> {
    match config.backend {
        BackendKind::Local => {
            let backend = LocalBackend::open(config.snapshot_path.clone()).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "s3")]
        BackendKind::S3 => {
            let backend = s3::S3Backend::from_config(config).await;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "s3"))]
        BackendKind::S3 => Err(crate::error::AppError::config(
            "storage.backend = \"s3\" requires building with the `s3` feature",
        )),
    }
}

/// Read and decode a typed value.
///
/// A value that no longer decodes is logged and reported as absent, so
/// callers fall back to re-fetching rather than failing.
pub(crate) async fn get_typed<T: DeserializeOwned>(
    backend: &dyn KeyValueBackend,
    key: &str,
) -> Result<Option<T>> {
    let Some(value) = backend.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            log::warn!("Discarding undecodable value at {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Encode and write a typed value.
pub(crate) async fn put_typed<T: Serialize + ?Sized>(
    backend: &dyn KeyValueBackend,
    key: &str,
    value: &T,
) -> Result<()> {
    let value = serde_json::to_value(value)?;
    backend.put(key, value).await
}

/// Keys used by the stores.
pub mod keys {
    use chrono::NaiveDate;

    fn encode(id: &str) -> String {
        url::form_urlencoded::byte_serialize(id.as_bytes()).collect()
    }

    pub fn record(id: &str) -> String {
        format!("records/{}", encode(id))
    }

    pub fn index(day: NaiveDate) -> String {
        format!("index/{}", super::day_key(day))
    }

    pub fn artifact(attachment_id: &str) -> String {
        format!("artifacts/{}", encode(attachment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn keys_are_stable_and_escaped() {
        assert_eq!(keys::record("A"), "records/A");
        assert_eq!(
            keys::artifact("https://cdn.example.com/f/1.pdf"),
            "artifacts/https%3A%2F%2Fcdn.example.com%2Ff%2F1.pdf"
        );
        assert_eq!(
            keys::index(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()),
            "index/2026-03-09"
        );
    }

    #[tokio::test]
    async fn undecodable_value_reads_as_absent() {
        let backend = LocalBackend::in_memory();
        backend
            .put("records/x", serde_json::json!({"unexpected": true}))
            .await
            .unwrap();

        let decoded: Option<crate::models::Record> =
            get_typed(&backend, "records/x").await.unwrap();
        assert!(decoded.is_none());
    }

    #[tokio::test]
    async fn open_local_backend_from_config() {
        let config = StorageConfig::default();
        let backend = open_backend(&config).await.unwrap();
        assert!(backend.describe().starts_with("memory"));
    }
}
