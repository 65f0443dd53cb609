// src/services/source.rs

//! Inbound interfaces to the polled source.
//!
//! All three are untrusted: payloads are only partially structured and any
//! call may fail or time out. [`HttpSource`] implements them over HTTP;
//! tests substitute in-memory fakes.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{Candidate, SourceConfig};
use crate::services::{attachments, parse};
use crate::utils::fill_template;
use crate::utils::http::{create_async_client, fetch_json};

/// Produces the current candidate listing.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Poll the listing. Any failure is an [`AppError::Listing`].
    async fn list_candidates(&self) -> Result<Vec<Candidate>>;
}

/// Produces the full payload of one item.
#[async_trait]
pub trait DetailSource: Send + Sync {
    /// Fetch the raw detail payload. Failures are [`AppError::DetailFetch`].
    async fn fetch_detail(&self, id: &str) -> Result<Value>;
}

/// Produces the binary content of an attachment.
#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Fetch an attachment; absence covers every kind of failure.
    async fn fetch_attachment(&self, attachment_id: &str) -> Option<Vec<u8>>;
}

/// HTTP implementation of all three source interfaces.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    config: SourceConfig,
}

impl HttpSource {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = create_async_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }
}

#[async_trait]
impl ListingSource for HttpSource {
    async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        if self.config.listing_url.is_empty() {
            return Err(AppError::listing("source.listing_url is not configured"));
        }

        let document = fetch_json(&self.client, &self.config.listing_url)
            .await
            .map_err(|e| AppError::listing(format!("{}: {}", self.config.listing_url, e)))?;

        if !document.is_array() && !document.is_object() {
            return Err(AppError::listing("listing is neither an array nor an object"));
        }

        let (candidates, skipped) = parse::parse_listing(&document);
        if skipped > 0 {
            log::warn!("Skipped {} listing entries without an id", skipped);
        }
        log::debug!("Listing returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

#[async_trait]
impl DetailSource for HttpSource {
    async fn fetch_detail(&self, id: &str) -> Result<Value> {
        let url = fill_template(&self.config.detail_url, id);
        fetch_json(&self.client, &url)
            .await
            .map_err(|e| AppError::detail(id, e))
    }
}

#[async_trait]
impl AttachmentSource for HttpSource {
    async fn fetch_attachment(&self, attachment_id: &str) -> Option<Vec<u8>> {
        let Some(url) = attachments::attachment_location(&self.config, attachment_id) else {
            log::warn!(
                "No download location for attachment {} (source.attachment_url is unset)",
                attachment_id
            );
            return None;
        };
        attachments::download(&self.client, &url, self.config.attachment_timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};
    use serde_json::json;

    fn source(server: &MockServer) -> HttpSource {
        HttpSource::new(SourceConfig {
            listing_url: server.url("/items"),
            detail_url: server.url("/items/{id}"),
            attachment_url: server.url("/files/{id}"),
            attachment_timeout_secs: 1,
            ..SourceConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_candidates() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/items");
                then.status(200).json_body(json!({
                    "items": [
                        {"id": "A", "revision": "r1", "date": "2026-02-01"},
                        {"id": "B"},
                        {"title": "no id"}
                    ]
                }));
            })
            .await;

        let candidates = source(&server).list_candidates().await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].revision.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_listing_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/items");
                then.status(500);
            })
            .await;

        let err = source(&server).list_candidates().await.unwrap_err();
        assert!(matches!(err, AppError::Listing(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_fetch_detail() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/items/A");
                then.status(200).json_body(json!({"title": "Hello"}));
            })
            .await;

        let payload = source(&server).fetch_detail("A").await.unwrap();
        mock.assert_async().await;
        assert_eq!(payload["title"], "Hello");
    }

    #[tokio::test]
    async fn test_fetch_detail_failure_names_id() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/items/A");
                then.status(502);
            })
            .await;

        let err = source(&server).fetch_detail("A").await.unwrap_err();
        match err {
            AppError::DetailFetch { id, .. } => assert_eq!(id, "A"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_attachment_by_template_and_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/files/f1");
                then.status(200).body("file one");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/files/slow");
                then.status(200)
                    .delay(std::time::Duration::from_millis(2500))
                    .body("late");
            })
            .await;

        let source = source(&server);
        assert_eq!(
            source.fetch_attachment("f1").await.as_deref(),
            Some(b"file one".as_slice())
        );
        assert!(source.fetch_attachment("slow").await.is_none());
    }
}
