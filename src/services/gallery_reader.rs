//! GalleryReader — list photos the caller may see, each with a signed URL.

use crate::{
    errors::{GalleryError, GalleryResult},
    models::photo::PhotoView,
    services::access_gate::AccessGate,
    stores::{blob_store::BlobStore, metadata_store::MetadataStore},
};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct GalleryReader {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    url_ttl: Duration,
}

impl GalleryReader {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>, url_ttl: Duration) -> Self {
        Self {
            blobs,
            metadata,
            url_ttl,
        }
    }

    /// Records in store-scan order. Callers must not rely on the ordering.
    pub async fn list(&self, gate: &AccessGate) -> GalleryResult<Vec<PhotoView>> {
        let records = self
            .metadata
            .scan_all()
            .await
            .map_err(|err| GalleryError::StoreUnavailable(Box::new(err)))?;

        let views = records
            .into_iter()
            .map(|record| PhotoView {
                url: self.blobs.signed_read_url(&record.photo_id, self.url_ttl),
                record,
            })
            .collect();

        Ok(gate.filter_visible(views, |view| &view.record))
    }
}
