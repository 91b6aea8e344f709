//! Photo metadata records and their read-side views.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Metadata for one photo in the shared collection.
///
/// The bytes live in the blob store under `photo_id`; this record is the
/// authoritative signal that the photo exists.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    /// Blob object key, `{uuid}.{ext}`. Immutable once created.
    pub photo_id: String,

    /// Caller-supplied title.
    pub title: Option<String>,

    /// Caller-supplied description.
    pub description: Option<String>,

    /// Whether standard callers may see this photo.
    pub is_public: bool,

    /// Creation time in the gallery's fixed timezone.
    pub create_time: DateTime<FixedOffset>,
}

impl PhotoRecord {
    /// A freshly uploaded record: public, stamped with `now`.
    pub fn new(
        photo_id: impl Into<String>,
        title: Option<String>,
        description: Option<String>,
        now: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            photo_id: photo_id.into(),
            title,
            description,
            is_public: true,
            create_time: now,
        }
    }
}

/// A record as returned to callers, with a freshly issued signed URL.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PhotoView {
    #[serde(flatten)]
    pub record: PhotoRecord,

    /// Time-limited read URL. Never persisted.
    pub url: String,
}

/// Persisted marker written before a blob upload begins and cleared once the
/// matching metadata record exists.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct UploadIntent {
    pub photo_id: String,
    pub created_at: DateTime<Utc>,
}
