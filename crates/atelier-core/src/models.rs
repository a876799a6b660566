//! Data models for Atelier
//!
//! Defines the unit of synchronization (`ArtworkRecord`), the mutation
//! payloads sent to the remote service, and the upload quota summary.
//! Field names serialize as camelCase to match the remote JSON binding.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel substring marking a record as a daily check-in marker
/// rather than a real artwork. Records carrying it in their description
/// are filtered out of the local gallery during reconciliation.
pub const CHECKIN_MARKER: &str = "[checkin]";

/// A synchronized artwork record
///
/// Ids are assigned by the remote service; there is exactly one record
/// per server id in the local cache. Ordering (most recent first) is
/// taken from the server and is a presentation concern only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkRecord {
    /// Server-assigned identifier
    pub id: i64,
    /// Display title
    pub title: String,
    /// Optional description / journal text
    #[serde(default)]
    pub description: Option<String>,
    /// Resolved absolute URL of the full-size image
    pub image_src: String,
    /// Resolved absolute URL of the thumbnail, if the server derived one
    #[serde(default)]
    pub thumbnail_src: Option<String>,
    /// When the artwork was uploaded
    pub uploaded_at: DateTime<Utc>,
    /// Tags for organization (ordered, de-duplicated)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Mood recorded with the upload
    #[serde(default)]
    pub mood: Option<String>,
    /// Rating (1-5)
    #[serde(default)]
    pub rating: Option<u8>,
    /// Time spent on the piece, in minutes
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Grouping id for multi-part uploads
    #[serde(default)]
    pub collection_id: Option<String>,
    /// Grouping display name
    #[serde(default)]
    pub collection_name: Option<String>,
    /// Position within the grouping
    #[serde(default)]
    pub collection_index: Option<u32>,
}

impl ArtworkRecord {
    /// True if this record is a check-in marker, not a real artwork
    pub fn is_checkin_marker(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| d.contains(CHECKIN_MARKER))
    }

    /// True if this record belongs to a multi-part upload grouping
    pub fn is_grouped(&self) -> bool {
        self.collection_id.is_some() || self.collection_name.is_some()
    }
}

/// Payload for creating an artwork
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewArtwork {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Source image URL or data reference understood by the server
    pub image_src: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub collection_index: Option<u32>,
}

impl NewArtwork {
    /// Create a new upload payload with the given title and image source
    pub fn new(title: impl Into<String>, image_src: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            image_src: image_src.into(),
            tags: Vec::new(),
            mood: None,
            rating: None,
            duration_minutes: None,
            collection_id: None,
            collection_name: None,
            collection_index: None,
        }
    }

    /// Generate a provisional client-side grouping id
    ///
    /// All parts of one multi-part upload share the id; the server may
    /// replace it with its own on reconciliation.
    pub fn new_collection_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Build the marker payload recording a daily check-in
    pub fn checkin_marker(date: NaiveDate) -> Self {
        let mut payload = Self::new("Daily check-in", "");
        payload.description = Some(format!("{} {}", CHECKIN_MARKER, date));
        payload
    }

    /// Add a tag (ignored if already present)
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Place this upload into a grouping
    pub fn set_collection(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        index: u32,
    ) {
        self.collection_id = Some(id.into());
        self.collection_name = Some(name.into());
        self.collection_index = Some(index);
    }
}

/// Partial update payload; `None` fields are left untouched server-side
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtworkPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_index: Option<u32>,
}

impl ArtworkPatch {
    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Upload quota summary returned by the remote service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuota {
    /// Whether another upload is currently allowed
    pub can_upload: bool,
    /// Uploads consumed in the current period
    pub used: u32,
    /// Maximum uploads per period
    pub max: u32,
}
