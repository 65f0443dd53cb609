//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote source endpoints and HTTP behavior
    #[serde(default)]
    pub source: SourceConfig,

    /// Sync cycle settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Attachment chunking parameters
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Relevance selection defaults
    #[serde(default)]
    pub relevance: RelevanceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.attachment_timeout_secs == 0 {
            return Err(AppError::validation(
                "source.attachment_timeout_secs must be > 0",
            ));
        }
        if self.source.max_concurrent == 0 {
            return Err(AppError::validation("source.max_concurrent must be > 0"));
        }
        if !self.source.detail_url.is_empty() && !self.source.detail_url.contains("{id}") {
            return Err(AppError::validation(
                "source.detail_url must contain an {id} placeholder",
            ));
        }
        if self.sync.window_days == 0 || self.sync.window_days > MAX_WINDOW_DAYS {
            return Err(AppError::validation(format!(
                "sync.window_days must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        if self.sync.poll_interval_secs == 0 {
            return Err(AppError::validation("sync.poll_interval_secs must be > 0"));
        }
        if self.sync.guard.max_drop_percent > 100 {
            return Err(AppError::validation(
                "sync.guard.max_drop_percent must be <= 100",
            ));
        }
        if self.storage.index_ttl_days == 0 {
            return Err(AppError::validation("storage.index_ttl_days must be > 0"));
        }
        if self.storage.backend == BackendKind::S3 && self.storage.bucket.trim().is_empty() {
            return Err(AppError::validation(
                "storage.bucket is required for the s3 backend",
            ));
        }
        if self.chunking.target_size == 0 {
            return Err(AppError::validation("chunking.target_size must be > 0"));
        }
        if self.chunking.overlap >= self.chunking.target_size {
            return Err(AppError::validation(
                "chunking.overlap must be smaller than chunking.target_size",
            ));
        }
        if self.relevance.default_limit == 0 {
            return Err(AppError::validation("relevance.default_limit must be > 0"));
        }
        Ok(())
    }
}

/// Remote source endpoints and HTTP client behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// URL returning the candidate listing
    #[serde(default)]
    pub listing_url: String,

    /// Detail URL template; `{id}` is replaced by the item id
    #[serde(default)]
    pub detail_url: String,

    /// Attachment URL template; `{id}` is replaced by the attachment id
    #[serde(default)]
    pub attachment_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Listing and detail request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attachment download timeout in seconds
    #[serde(default = "defaults::attachment_timeout")]
    pub attachment_timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay between completed detail requests in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn attachment_timeout(&self) -> Duration {
        Duration::from_secs(self.attachment_timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: String::new(),
            detail_url: String::new(),
            attachment_url: String::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            attachment_timeout_secs: defaults::attachment_timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
        }
    }
}

/// Longest accepted sync window, in days.
pub const MAX_WINDOW_DAYS: u32 = 3650;

/// Sync cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Days of stored records (ending today) compared against each listing
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,

    /// Seconds between polls in watch mode; also the effective retry interval
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub guard: ListingGuardConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: defaults::window_days(),
            poll_interval_secs: defaults::poll_interval(),
            guard: ListingGuardConfig::default(),
        }
    }
}

/// Thresholds for rejecting a suspiciously small listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingGuardConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Maximum allowed drop percentage (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Below this many stored records the check is skipped
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for ListingGuardConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Which key-value backend holds records, index and artifacts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    S3,
}

/// Storage backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Snapshot file for the local backend; memory-only when unset
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Days a date index bucket lives after its last write
    #[serde(default = "defaults::index_ttl_days")]
    pub index_ttl_days: u32,

    /// S3 bucket (s3 backend only)
    #[serde(default)]
    pub bucket: String,

    /// S3 key prefix (s3 backend only)
    #[serde(default = "defaults::prefix")]
    pub prefix: String,
}

impl StorageConfig {
    pub fn index_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.index_ttl_days))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            snapshot_path: None,
            index_ttl_days: defaults::index_ttl_days(),
            bucket: String::new(),
            prefix: defaults::prefix(),
        }
    }
}

/// Attachment chunking parameters, in characters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    #[serde(default = "defaults::target_size")]
    pub target_size: usize,

    #[serde(default = "defaults::overlap")]
    pub overlap: usize,

    /// Chunks shorter than this are dropped (capped at half the target)
    #[serde(default = "defaults::min_chars")]
    pub min_chars: usize,
}

impl ChunkingConfig {
    pub fn new(target_size: usize, overlap: usize) -> Self {
        Self {
            target_size,
            overlap,
            min_chars: defaults::min_chars(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::new(defaults::target_size(), defaults::overlap())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevanceConfig {
    /// Number of chunks returned when the caller gives no limit
    #[serde(default = "defaults::default_limit")]
    pub default_limit: usize,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            default_limit: defaults::default_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "defaults::level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::level(),
        }
    }
}

mod defaults {
    // Source defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; pollsync/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn attachment_timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        8
    }

    // Sync defaults
    pub fn window_days() -> u32 {
        30
    }
    pub fn poll_interval() -> u64 {
        300
    }
    pub fn enabled() -> bool {
        true
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        10
    }

    // Storage defaults
    pub fn index_ttl_days() -> u32 {
        30
    }
    pub fn prefix() -> String {
        "pollsync".into()
    }

    // Chunking defaults
    pub fn target_size() -> usize {
        1000
    }
    pub fn overlap() -> usize {
        200
    }
    pub fn min_chars() -> usize {
        50
    }

    pub fn default_limit() -> usize {
        10
    }
    pub fn level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.source.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.source.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlap_not_below_target() {
        let mut config = Config::default();
        config.chunking = ChunkingConfig::new(100, 100);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_bucket_for_s3() {
        let mut config = Config::default();
        config.storage.backend = BackendKind::S3;
        assert!(config.validate().is_err());
        config.storage.bucket = "records".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_id_placeholder() {
        let mut config = Config::default();
        config.source.detail_url = "https://example.com/items".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [source]
            listing_url = "https://example.com/items"
            detail_url = "https://example.com/items/{id}"

            [storage]
            backend = "local"
            snapshot_path = "storage/snapshot.json"

            [chunking]
            target_size = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.source.timeout_secs, 15);
        assert_eq!(config.source.attachment_timeout_secs, 30);
        assert_eq!(config.chunking.target_size, 400);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.storage.index_ttl_days, 30);
        assert_eq!(
            config.storage.snapshot_path,
            Some(PathBuf::from("storage/snapshot.json"))
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config.source.max_concurrent, Config::default().source.max_concurrent);

        let path = dir.path().join("config.toml");
        fs::write(&path, "[relevance]\ndefault_limit = 3\n").unwrap();
        assert_eq!(Config::load_or_default(&path).relevance.default_limit, 3);
    }

    #[test]
    fn test_window_days_bounds() {
        let mut config = Config::default();
        config.sync.window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());

        config.sync.window_days = 100_000;
        assert!(matches!(config.validate(), Err(AppError::Validation(_))));
    }
}
