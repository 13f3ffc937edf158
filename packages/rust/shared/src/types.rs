//! Core domain types for MediaImport.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-row metadata: every CSV column except `src`, keyed by header name.
pub type Metadata = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// MediaId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for media item identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub Uuid);

impl MediaId {
    /// Generate a new time-sortable media identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MediaId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// DescriptiveFields
// ---------------------------------------------------------------------------

/// Caption/description pair applied to a stored item in one update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DescriptiveFields {
    /// Build from row metadata, keeping only non-empty `caption`/`description`.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let pick = |key: &str| {
            metadata
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
        };
        Self {
            caption: pick("caption"),
            description: pick("description"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.caption.is_none() && self.description.is_none()
    }
}

// ---------------------------------------------------------------------------
// MediaRecord
// ---------------------------------------------------------------------------

/// A stored media item as read back from the library database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: MediaId,
    /// Final filename inside the library (may carry a `-N` suffix).
    pub filename: String,
    /// Path of the stored file, relative to the library root.
    pub path: String,
    /// URL the file was downloaded from.
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// SHA-256 hash of the file content.
    pub content_hash: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Row metadata as submitted at import time.
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_id_roundtrip() {
        let id = MediaId::new();
        let s = id.to_string();
        let parsed: MediaId = s.parse().expect("parse MediaId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn descriptive_fields_skip_empty_values() {
        let mut metadata = Metadata::new();
        metadata.insert("caption".into(), "".into());
        metadata.insert("description".into(), "Harbour at dusk".into());
        metadata.insert("alt".into(), "Sunset".into());

        let fields = DescriptiveFields::from_metadata(&metadata);
        assert_eq!(fields.caption, None);
        assert_eq!(fields.description.as_deref(), Some("Harbour at dusk"));
        assert!(!fields.is_empty());

        assert!(DescriptiveFields::from_metadata(&Metadata::new()).is_empty());
    }

    #[test]
    fn media_record_serialization() {
        let record = MediaRecord {
            id: MediaId::new(),
            filename: "photo.png".into(),
            path: "files/2026/10/photo.png".into(),
            source_url: "https://example.com/photo.png".into(),
            mime_type: Some("image/png".into()),
            content_hash: "abc".into(),
            size: 42,
            alt_text: Some("Sunset".into()),
            caption: None,
            description: None,
            metadata: Metadata::from([("alt".to_string(), "Sunset".to_string())]),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&record).expect("serialize");
        assert!(!json.contains("caption"));
        let parsed: MediaRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.metadata.get("alt").map(String::as_str), Some("Sunset"));
    }
}
