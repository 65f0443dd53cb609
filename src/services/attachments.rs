// src/services/attachments.rs

//! Attachment download with single-hop envelope resolution.
//!
//! Some sources answer an attachment request with a small JSON document
//! pointing at the real file instead of the file itself. One such hop is
//! followed; a second envelope is treated as unavailable.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::models::SourceConfig;
use crate::utils::http::is_json_response;
use crate::utils::{fill_template, is_absolute_url, resolve};

const ENVELOPE_KEYS: &[&str] = &["url", "href", "download_url", "location"];

/// Result of a single attachment request.
#[derive(Debug, PartialEq, Eq)]
enum Fetched {
    Binary(Vec<u8>),
    Envelope(String),
}

/// Where an attachment id is downloaded from.
///
/// Absolute URLs are used as-is; anything else fills the configured
/// attachment template. Returns None when no template is configured.
pub fn attachment_location(config: &SourceConfig, attachment_id: &str) -> Option<String> {
    if is_absolute_url(attachment_id) {
        return Some(attachment_id.to_string());
    }
    if config.attachment_url.is_empty() {
        return None;
    }
    Some(fill_template(&config.attachment_url, attachment_id))
}

/// Target of a JSON envelope, if the document is one.
pub fn envelope_target(document: &Value) -> Option<String> {
    let lookup = |value: &Value| {
        ENVELOPE_KEYS
            .iter()
            .filter_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(String::from)
    };
    lookup(document).or_else(|| document.get("data").and_then(lookup))
}

/// Download an attachment, following at most one envelope.
///
/// Timeouts, transport errors and non-2xx statuses all yield None and are
/// logged at warn.
pub async fn download(client: &Client, url: &str, timeout: Duration) -> Option<Vec<u8>> {
    match fetch_once(client, url, timeout).await? {
        Fetched::Binary(bytes) => Some(bytes),
        Fetched::Envelope(next) => {
            log::debug!("Attachment {} points to {}", url, next);
            match fetch_once(client, &next, timeout).await? {
                Fetched::Binary(bytes) => Some(bytes),
                Fetched::Envelope(deeper) => {
                    log::warn!(
                        "Attachment {} resolves through more than one envelope ({}), giving up",
                        url,
                        deeper
                    );
                    None
                }
            }
        }
    }
}

async fn fetch_once(client: &Client, url: &str, timeout: Duration) -> Option<Fetched> {
    let response = match client.get(url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(e) => {
            log::warn!("Attachment request {} failed: {}", url, e);
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        log::warn!("Attachment request {} returned {}", url, status);
        return None;
    }

    let json = is_json_response(&response);
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => {
            log::warn!("Attachment body {} could not be read: {}", url, e);
            return None;
        }
    };

    if json {
        let target = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .as_ref()
            .and_then(envelope_target);
        if let Some(target) = target {
            let next = resolve(url, &target).unwrap_or(target);
            return Some(Fetched::Envelope(next));
        }
    }
    Some(Fetched::Binary(bytes))
}
