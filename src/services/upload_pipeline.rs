//! UploadPipeline — validate an image payload and write it to both stores.
//!
//! Ordering is fixed: upload intent, then blob, then metadata record, then
//! intent cleared. A failure after the blob write leaves an orphan object
//! which the reconciler removes once its intent has aged out.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::photo::PhotoRecord,
    services::access_gate::{AccessGate, Action},
    stores::{blob_store::BlobStore, metadata_store::MetadataStore},
};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{FixedOffset, Utc};
use image::ImageFormat;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Image types the gallery accepts, identified from the bytes themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
}

impl ImageKind {
    /// Sniff the payload's magic bytes. Anything other than PNG, JPEG or GIF
    /// is `None`, whatever the caller claims it is.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some(ImageKind::Png),
            ImageFormat::Jpeg => Some(ImageKind::Jpeg),
            ImageFormat::Gif => Some(ImageKind::Gif),
            _ => None,
        }
    }

    /// Recover the kind from an object key's extension.
    pub fn from_key(key: &str) -> Option<Self> {
        let (_, ext) = key.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageKind::Png),
            "jpg" | "jpeg" => Some(ImageKind::Jpeg),
            "gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Gif => "gif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// Caller-supplied descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct UploadDetails {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct UploadPipeline {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    timezone: FixedOffset,
}

impl UploadPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        timezone: FixedOffset,
    ) -> Self {
        Self {
            blobs,
            metadata,
            timezone,
        }
    }

    /// Decode a base64 payload, optionally carrying a data URL header such as
    /// `data:image/png;base64,`, then upload it. The declared MIME type in
    /// the header is ignored.
    pub async fn upload_base64(
        &self,
        gate: &AccessGate,
        image_data: &str,
        details: UploadDetails,
    ) -> GalleryResult<PhotoRecord> {
        gate.authorize(Action::Upload)?;
        let bytes = decode_image_data(image_data)?;
        self.upload(gate, bytes, details).await
    }

    /// Validate and store a raw payload. Returns the persisted record.
    pub async fn upload(
        &self,
        gate: &AccessGate,
        bytes: Bytes,
        details: UploadDetails,
    ) -> GalleryResult<PhotoRecord> {
        gate.authorize(Action::Upload)?;

        if bytes.is_empty() {
            return Err(GalleryError::InvalidInput("payload required".into()));
        }
        let kind = ImageKind::sniff(&bytes)
            .ok_or_else(|| GalleryError::InvalidInput("unsupported file type".into()))?;

        let key = format!("{}.{}", Uuid::new_v4(), kind.extension());

        self.metadata
            .record_intent(&key)
            .await
            .map_err(|err| GalleryError::UploadFailed(Box::new(err)))?;

        if let Err(err) = self.blobs.put(&key, bytes, kind.content_type()).await {
            // nothing was stored; a leftover intent is harmless and gets swept
            if let Err(clear_err) = self.metadata.clear_intent(&key).await {
                warn!("could not clear upload intent for {}: {}", key, clear_err);
            }
            return Err(GalleryError::UploadFailed(Box::new(err)));
        }

        let record = PhotoRecord::new(
            key.clone(),
            details.title,
            details.description,
            Utc::now().with_timezone(&self.timezone),
        );
        if let Err(err) = self.metadata.put(&record).await {
            warn!(
                "metadata write failed after blob upload, object {} is orphaned: {}",
                key, err
            );
            return Err(GalleryError::UploadFailed(Box::new(err)));
        }

        if let Err(err) = self.metadata.clear_intent(&key).await {
            warn!("could not clear upload intent for {}: {}", key, err);
        }

        info!("uploaded photo {} ({})", key, kind.content_type());
        Ok(record)
    }
}

fn decode_image_data(image_data: &str) -> GalleryResult<Bytes> {
    let encoded = match image_data.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => image_data,
    };
    let encoded = encoded.trim();
    if encoded.is_empty() {
        return Err(GalleryError::InvalidInput("payload required".into()));
    }
    general_purpose::STANDARD
        .decode(encoded)
        .map(Bytes::from)
        .map_err(|_| GalleryError::InvalidInput("payload is not valid base64".into()))
}
