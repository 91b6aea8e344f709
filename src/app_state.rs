//! Shared handler state.

use crate::{
    config::AppConfig,
    services::{
        deletion_coordinator::DeletionCoordinator, gallery_reader::GalleryReader,
        reconciler::Reconciler, upload_pipeline::UploadPipeline,
        visibility_toggle::VisibilityToggle,
    },
    stores::{blob_store::BlobStore, metadata_store::MetadataStore},
};
use std::sync::Arc;

/// Everything a handler needs. Cheap to clone: stores are shared behind
/// `Arc` and the operations hold nothing else.
#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub gallery: GalleryReader,
    pub uploads: UploadPipeline,
    pub visibility: VisibilityToggle,
    pub deletions: DeletionCoordinator,
    pub admin_group: Arc<str>,
    pub claims_header: Arc<str>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            gallery: GalleryReader::new(blobs.clone(), metadata.clone(), cfg.url_ttl),
            uploads: UploadPipeline::new(blobs.clone(), metadata.clone(), cfg.timezone),
            visibility: VisibilityToggle::new(metadata.clone()),
            deletions: DeletionCoordinator::new(blobs.clone(), metadata.clone()),
            admin_group: cfg.admin_group.as_str().into(),
            claims_header: cfg.claims_header.to_ascii_lowercase().into(),
            blobs,
            metadata,
        }
    }

    pub fn reconciler(&self, cfg: &AppConfig) -> Reconciler {
        Reconciler::new(self.blobs.clone(), self.metadata.clone(), cfg.reconcile_grace)
    }
}
