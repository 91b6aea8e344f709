//! DeletionCoordinator — remove a photo from metadata, then from blobs.
//!
//! Metadata is the authoritative existence signal, so once the record is
//! gone the deletion has succeeded. A failed blob delete afterwards is
//! logged as an orphan for the reconciler.

use crate::{
    errors::{GalleryError, GalleryResult},
    services::access_gate::{AccessGate, Action},
    stores::{
        blob_store::{BlobError, BlobStore},
        metadata_store::{MetadataError, MetadataStore},
    },
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct DeletionCoordinator {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl DeletionCoordinator {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, metadata }
    }

    pub async fn delete(&self, gate: &AccessGate, photo_id: &str) -> GalleryResult<()> {
        gate.authorize(Action::Delete)?;

        self.metadata
            .get(photo_id)
            .await
            .map_err(|err| map_metadata_error(photo_id, err))?;

        // a concurrent delete may win between the read and this call
        self.metadata
            .delete(photo_id)
            .await
            .map_err(|err| map_metadata_error(photo_id, err))?;

        match self.blobs.delete(photo_id).await {
            Ok(()) => {}
            Err(BlobError::NotFound(_)) => debug!("blob {} already missing", photo_id),
            Err(err) => warn!(
                "metadata for {} deleted but blob delete failed, object is orphaned: {}",
                photo_id, err
            ),
        }

        info!("deleted photo {}", photo_id);
        Ok(())
    }
}

fn map_metadata_error(photo_id: &str, err: MetadataError) -> GalleryError {
    match err {
        MetadataError::NotFound(_) => GalleryError::NotFound(format!("photo {} not found", photo_id)),
        other => GalleryError::DeleteFailed(Box::new(other)),
    }
}
