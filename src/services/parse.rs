// src/services/parse.rs

//! Tolerant parsing of listing and detail payloads.
//!
//! The remote source has changed its payload shape over time, so every
//! concept is looked up under several field names and every read is
//! optional. Nothing here returns an error: a field that is missing or
//! malformed is simply left unset.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use scraper::Html;
use serde_json::Value;

use crate::models::{AttachmentRef, Candidate, Record};
use crate::utils::is_absolute_url;

const ID_KEYS: &[&str] = &["id", "uid", "key", "item_id", "itemId", "guid"];
const REVISION_KEYS: &[&str] = &[
    "revision",
    "updated_at",
    "updatedAt",
    "modified",
    "modified_at",
    "last_modified",
    "etag",
    "version",
];
const DATE_KEYS: &[&str] = &[
    "date",
    "nominal_date",
    "published_at",
    "publishedAt",
    "published",
    "created_at",
    "createdAt",
    "posted_at",
];
const TITLE_KEYS: &[&str] = &["title", "subject", "name", "headline"];
const BODY_KEYS: &[&str] = &["body", "content", "description", "text", "summary"];
const BODY_INNER_KEYS: &[&str] = &["text", "value", "html", "content"];
const ATTACHMENT_KEYS: &[&str] = &["attachments", "files", "documents", "attachment"];
const ATTACHMENT_ID_KEYS: &[&str] = &["id", "uid", "file_id", "key"];
const URL_KEYS: &[&str] = &["url", "href", "download_url", "downloadUrl", "link"];
const NAME_KEYS: &[&str] = &["name", "filename", "file_name", "title"];
const MEDIA_TYPE_KEYS: &[&str] = &["mime_type", "mimeType", "content_type", "type"];
const LIST_KEYS: &[&str] = &["items", "results", "data", "entries", "records"];
const WRAPPER_KEYS: &[&str] = &["data", "item", "record", "result"];

static LOOSE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})[./-](\d{1,2})[./-](\d{1,2})").expect("static date pattern")
});
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("static tag pattern"));

/// Parse a listing document into candidates.
///
/// Accepts a bare array or an object wrapping the array. Returns the
/// candidates plus the number of entries skipped for lacking an id.
pub fn parse_listing(document: &Value) -> (Vec<Candidate>, usize) {
    let Some(entries) = find_entries(document, 2) else {
        return (Vec::new(), 0);
    };

    let mut skipped = 0;
    let candidates = entries
        .iter()
        .filter_map(|entry| {
            let candidate = parse_candidate(entry);
            if candidate.is_none() {
                skipped += 1;
            }
            candidate
        })
        .collect();
    (candidates, skipped)
}

/// Parse one listing entry. Entries without an id yield None.
pub fn parse_candidate(entry: &Value) -> Option<Candidate> {
    let id = first_string(entry, ID_KEYS)?;
    Some(Candidate {
        id,
        revision: first_string(entry, REVISION_KEYS),
        date: first_date(entry, DATE_KEYS),
    })
}

/// Map a detail payload onto a canonical record.
///
/// The listed revision marker wins over the payload's, since it is what
/// the next poll is compared against. The date falls back from the payload
/// to the listing to the retrieval day.
pub fn parse_record(candidate: &Candidate, payload: &Value, retrieved_at: DateTime<Utc>) -> Record {
    let item = unwrap_payload(payload, 2);

    Record {
        id: candidate.id.clone(),
        revision: candidate
            .revision
            .clone()
            .or_else(|| first_string(item, REVISION_KEYS)),
        date: first_date(item, DATE_KEYS)
            .or(candidate.date)
            .unwrap_or_else(|| retrieved_at.date_naive()),
        title: first_string(item, TITLE_KEYS),
        body: parse_body(item),
        attachments: parse_attachments(item),
        retrieved_at,
    }
}

/// Parse a date from any of the shapes the source has used.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n.as_i64().and_then(date_from_epoch),
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }
    if let Some(caps) = LOOSE_DATE.captures(s) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y%m%d") {
            return Some(date);
        }
    }
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok().and_then(date_from_epoch);
    }
    None
}

/// Epoch seconds, or milliseconds when the magnitude says so.
fn date_from_epoch(value: i64) -> Option<NaiveDate> {
    let dt = if value.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };
    dt.map(|d| d.date_naive())
}

/// Locate the array of listing entries.
fn find_entries(document: &Value, depth: usize) -> Option<&Vec<Value>> {
    match document {
        Value::Array(entries) => Some(entries),
        Value::Object(map) if depth > 0 => LIST_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| find_entries(inner, depth - 1)),
        _ => None,
    }
}

/// Descend through envelope objects such as `{"data": {...}}`.
fn unwrap_payload(payload: &Value, depth: usize) -> &Value {
    if depth == 0 || has_any(payload, TITLE_KEYS) || has_any(payload, ID_KEYS) {
        return payload;
    }
    WRAPPER_KEYS
        .iter()
        .filter_map(|key| payload.get(*key))
        .find(|inner| inner.is_object())
        .map(|inner| unwrap_payload(inner, depth - 1))
        .unwrap_or(payload)
}

fn has_any(value: &Value, keys: &[&str]) -> bool {
    keys.iter().any(|key| value.get(*key).is_some_and(|v| !v.is_null()))
}

/// First non-empty string (or number) under any of the keys.
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(scalar_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_date(value: &Value, keys: &[&str]) -> Option<NaiveDate> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(parse_date)
}

fn parse_body(item: &Value) -> Option<String> {
    let raw = BODY_KEYS.iter().filter_map(|key| item.get(*key)).find_map(|value| {
        match value {
            Value::Object(_) => first_string(value, BODY_INNER_KEYS),
            other => scalar_string(other),
        }
    })?;

    let text = if HTML_TAG.is_match(&raw) {
        html_to_text(&raw)
    } else {
        raw
    };
    (!text.is_empty()).then_some(text)
}

/// Reduce an HTML fragment to whitespace-normalised text.
fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_attachments(item: &Value) -> Vec<AttachmentRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for key in ATTACHMENT_KEYS {
        let entries: Vec<&Value> = match item.get(*key) {
            Some(Value::Array(list)) => list.iter().collect(),
            Some(value @ (Value::Object(_) | Value::String(_))) => vec![value],
            _ => continue,
        };
        for entry in entries {
            if let Some(attachment) = parse_attachment(entry) {
                if seen.insert(attachment.id.clone()) {
                    refs.push(attachment);
                }
            }
        }
    }
    refs
}

/// Re-key attachments by their absolute download URL.
///
/// Used when no attachment URL template is configured: the payload's URL
/// is then the only way to fetch the file, so it becomes the id the
/// artifact pipeline is asked for. Refs without a usable URL keep their id.
pub fn key_by_download_url(attachments: Vec<AttachmentRef>) -> Vec<AttachmentRef> {
    let mut seen = HashSet::new();
    attachments
        .into_iter()
        .map(|mut attachment| {
            if let Some(url) = attachment.url.as_deref().filter(|u| is_absolute_url(u)) {
                attachment.id = url.to_string();
            }
            attachment
        })
        .filter(|attachment| seen.insert(attachment.id.clone()))
        .collect()
}

fn parse_attachment(entry: &Value) -> Option<AttachmentRef> {
    if let Some(raw) = scalar_string(entry) {
        let url = is_absolute_url(&raw).then(|| raw.clone());
        return Some(AttachmentRef {
            id: raw,
            name: None,
            url,
            media_type: None,
        });
    }
    if !entry.is_object() {
        return None;
    }

    let url = first_string(entry, URL_KEYS);
    let id = first_string(entry, ATTACHMENT_ID_KEYS).or_else(|| url.clone())?;
    Some(AttachmentRef {
        id,
        name: first_string(entry, NAME_KEYS),
        url,
        media_type: first_string(entry, MEDIA_TYPE_KEYS),
    })
}
