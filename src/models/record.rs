//! Record and listing data structures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An item as it appears in a polled listing.
///
/// Listing data is never persisted on its own; it only drives change
/// detection and seeds the fields a detail payload leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Stable item identifier
    pub id: String,

    /// Opaque revision marker (timestamp, etag, version number...)
    pub revision: Option<String>,

    /// Nominal date, if the listing exposes one
    pub date: Option<NaiveDate>,
}

impl Candidate {
    pub fn new(id: impl Into<String>, revision: Option<&str>, date: Option<NaiveDate>) -> Self {
        Self {
            id: id.into(),
            revision: revision.map(String::from),
            date,
        }
    }
}

/// Reference to a binary attachment of a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRef {
    /// Attachment identifier (may itself be an absolute URL)
    pub id: String,

    /// Display or file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Direct download location, when the payload provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Declared media type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}

/// A fully detail-fetched record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub id: String,

    /// Revision marker the record was fetched at
    #[serde(default)]
    pub revision: Option<String>,

    /// Nominal date, the partition key of the date index
    pub date: NaiveDate,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,

    /// When the detail payload was retrieved
    pub retrieved_at: DateTime<Utc>,
}

impl Record {
    /// Ids of all attachments, in payload order.
    pub fn attachment_ids(&self) -> Vec<String> {
        self.attachments.iter().map(|a| a.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record {
            id: "A".to_string(),
            revision: Some("r1".to_string()),
            date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
            title: Some("Budget hearing".to_string()),
            body: None,
            attachments: vec![AttachmentRef {
                id: "att-1".to_string(),
                name: Some("minutes.pdf".to_string()),
                url: None,
                media_type: None,
            }],
            retrieved_at: Utc::now(),
        }
    }

    #[test]
    fn test_serde_round_trip_keeps_equality() {
        let record = sample_record();
        let json = serde_json::to_value(&record).unwrap();
        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
