//! Local storage backend.
//!
//! Keeps all entries in memory and, when a snapshot path is configured,
//! mirrors them to a single JSON file after every mutation so a restarted
//! process picks up where it left off. Production deployments that need a
//! shared durable store should use the S3 backend.
//!
//! ## Snapshot Layout
//!
//! ```json
//! {
//!   "saved_at": "2026-02-01T09:00:00Z",
//!   "count": 3,
//!   "entries": { "records/A": { ... }, "index/2026-02-01": { ... } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::KeyValueBackend;

/// On-disk form of the local backend.
#[derive(Debug, Clone, Deserialize)]
struct Snapshot {
    saved_at: DateTime<Utc>,
    count: usize,
    entries: BTreeMap<String, Value>,
}

/// Borrowed view written on every mutation.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    saved_at: DateTime<Utc>,
    count: usize,
    entries: &'a BTreeMap<String, Value>,
}

/// In-memory backend with an optional snapshot file.
///
/// Mutations hold the write lock until the snapshot is on disk, so a
/// failed snapshot write is rolled back before any reader sees the value.
pub struct LocalBackend {
    entries: RwLock<BTreeMap<String, Value>>,
    snapshot_path: Option<PathBuf>,
}

impl LocalBackend {
    /// Create a memory-only backend.
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            snapshot_path: None,
        }
    }

    /// Open a backend, restoring entries from the snapshot if one exists.
    pub async fn open(snapshot_path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = snapshot_path else {
            return Ok(Self::in_memory());
        };

        let entries = match Self::read_snapshot(&path).await? {
            Some(snapshot) => {
                log::info!(
                    "Restored {} entries from snapshot {} (saved {})",
                    snapshot.count,
                    path.display(),
                    snapshot.saved_at
                );
                snapshot.entries
            }
            None => {
                log::info!("No snapshot at {}, starting empty", path.display());
                BTreeMap::new()
            }
        };

        Ok(Self {
            entries: RwLock::new(entries),
            snapshot_path: Some(path),
        })
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Read the snapshot file, returning None if it doesn't exist.
    async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::Io(e)),
        };
        let snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            AppError::store(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;
        Ok(Some(snapshot))
    }

    /// Write `entries` to the snapshot file, if configured.
    async fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = SnapshotRef {
            saved_at: Utc::now(),
            count: entries.len(),
            entries,
        };
        let bytes = serde_json::to_vec(&snapshot)?;

        Self::write_bytes(path, &bytes)
            .await
            .map_err(|e| AppError::store(format!("snapshot {}: {}", path.display(), e)))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await
    }
}

#[async_trait]
impl KeyValueBackend for LocalBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.write().await;
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.persist(&entries).await {
            match previous {
                Some(previous) => entries.insert(key.to_string(), previous),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let Some(removed) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries).await {
            entries.insert(key.to_string(), removed);
            return Err(e);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.snapshot_path {
            Some(path) => format!("local snapshot {}", path.display()),
            None => "memory".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_and_read() {
        let storage = LocalBackend::in_memory();

        storage.put("a", json!({"v": 1})).await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), Some(json!({"v": 1})));

        storage.put("a", json!({"v": 2})).await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let storage = LocalBackend::in_memory();
        assert!(storage.get("nope").await.unwrap().is_none());
        storage.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state/snapshot.json");

        let first = LocalBackend::open(Some(path.clone())).await.unwrap();
        first.put("records/A", json!({"id": "A"})).await.unwrap();
        first.put("records/B", json!({"id": "B"})).await.unwrap();
        first.delete("records/B").await.unwrap();
        drop(first);

        let reopened = LocalBackend::open(Some(path.clone())).await.unwrap();
        assert_eq!(reopened.len().await, 1);
        assert_eq!(
            reopened.get("records/A").await.unwrap(),
            Some(json!({"id": "A"}))
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_store_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snapshot.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let result = LocalBackend::open(Some(path)).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_is_rolled_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state/snapshot.json");
        let storage = LocalBackend::open(Some(path)).await.unwrap();
        storage.put("kept", json!(1)).await.unwrap();

        // A file where the snapshot directory should be makes writes fail.
        std::fs::remove_dir_all(tmp.path().join("state")).unwrap();
        std::fs::write(tmp.path().join("state"), b"not a directory").unwrap();

        let err = storage.put("lost", json!(2)).await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(storage.get("lost").await.unwrap().is_none());

        assert!(storage.put("kept", json!(3)).await.is_err());
        assert_eq!(storage.get("kept").await.unwrap(), Some(json!(1)));

        assert!(storage.delete("kept").await.is_err());
        assert_eq!(storage.get("kept").await.unwrap(), Some(json!(1)));
    }
}
