// src/config.rs

//! Configuration loading for the Lambda environment.
//!
//! The Lambda has no filesystem to speak of, so `config.toml` lives in the
//! same bucket as the data and is read through the S3 backend.

use crate::error::{AppError, Result};
use crate::models::{BackendKind, Config};
use crate::storage::s3::S3Backend;

/// Default object key of the Lambda configuration file.
pub const DEFAULT_CONFIG_KEY: &str = "config/config.toml";

/// Config loader for Lambda environment.
pub struct LambdaConfigLoader {
    storage: S3Backend,
    key: String,
}

impl LambdaConfigLoader {
    pub fn new(storage: S3Backend, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    /// Loader for `CONFIG_KEY` (default `config/config.toml`).
    pub fn from_env(storage: S3Backend) -> Self {
        let key = std::env::var("CONFIG_KEY").unwrap_or_else(|_| DEFAULT_CONFIG_KEY.to_string());
        Self::new(storage, key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load, force the S3 backend and validate the configuration.
    ///
    /// `S3_BUCKET` and `S3_PREFIX` from the environment override the file.
    pub async fn load_config(&self) -> Result<Config> {
        log::info!("Loading config file from S3: {}", self.key);
        let bytes = self
            .storage
            .read_bytes_optional(&self.key)
            .await?
            .ok_or_else(|| AppError::config(format!("Config file not found in S3: {}", self.key)))?;

        let text = String::from_utf8(bytes).map_err(|e| {
            AppError::config(format!("Config file {} is not valid UTF-8: {}", self.key, e))
        })?;
        let mut config = Config::from_toml(&text)?;
        apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }
}

/// Point the storage section at the S3 bucket named by the environment.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    config.storage.backend = BackendKind::S3;
    if let Some(bucket) = var("S3_BUCKET").filter(|b| !b.trim().is_empty()) {
        config.storage.bucket = bucket;
    }
    if let Some(prefix) = var("S3_PREFIX") {
        config.storage.prefix = prefix;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| match name {
            "S3_BUCKET" => Some("records-bucket".to_string()),
            "S3_PREFIX" => Some("prod".to_string()),
            _ => None,
        });
        assert_eq!(config.storage.backend, BackendKind::S3);
        assert_eq!(config.storage.bucket, "records-bucket");
        assert_eq!(config.storage.prefix, "prod");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_env_keeps_file_values() {
        let mut config = Config::from_toml("[storage]\nbucket = \"from-file\"\n").unwrap();
        apply_env_overrides(&mut config, |_| None);
        assert_eq!(config.storage.bucket, "from-file");
        assert_eq!(config.storage.prefix, "pollsync");
    }
}
