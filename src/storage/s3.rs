//! AWS S3 storage backend.
//!
//! Every key maps to one JSON object at `s3://{bucket}/{prefix}/{key}.json`.
//! S3 gives read-after-write consistency for single objects, which is all
//! the stores above rely on.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::KeyValueBackend;

/// S3-based key-value backend.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Backend {
    /// Create a new S3 backend instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 backend from the ambient AWS environment and storage config.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&aws), &config.bucket, &config.prefix)
    }

    /// Create an S3 backend from environment variables.
    ///
    /// - `S3_BUCKET`: bucket name (default: `pollsync`)
    /// - `S3_PREFIX`: key prefix (default: `pollsync`)
    pub async fn from_env() -> Self {
        let mut config = StorageConfig::default();
        config.bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "pollsync".to_string());
        if let Ok(prefix) = std::env::var("S3_PREFIX") {
            config.prefix = prefix;
        }
        Self::from_config(&config).await
    }

    /// Read raw bytes, returning None if the object doesn't exist.
    pub async fn read_bytes_optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::store(format!("s3://{}/{}: {}", self.bucket, key, e)))?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(AppError::store(format!(
                        "s3://{}/{}: {}",
                        self.bucket, key, service_err
                    )))
                }
            }
        }
    }

    /// Full object key for a store key.
    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}.json", key)
        } else {
            format!("{}/{}.json", prefix, key)
        }
    }
}

#[async_trait]
impl KeyValueBackend for S3Backend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.read_bytes_optional(&self.object_key(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        let object_key = self.object_key(key);
        let bytes = ByteStream::from(serde_json::to_vec(&value)?);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(bytes)
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::store(format!("s3://{}/{}: {}", self.bucket, object_key, e)))?;

        log::debug!("Wrote s3://{}/{}", self.bucket, object_key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let object_key = self.object_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| AppError::store(format!("s3://{}/{}: {}", self.bucket, object_key, e)))?;

        log::debug!("Deleted s3://{}/{}", self.bucket, object_key);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.prefix.trim_matches('/'))
    }
}
