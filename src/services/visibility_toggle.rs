//! VisibilityToggle — flip `is_public` with optimistic concurrency.
//!
//! Each attempt writes the negation of the value it read, conditional on the
//! stored value being unchanged. A concurrent toggle turns the write into a
//! `Conflict`; the toggle then re-reads and tries again.

use crate::{
    errors::{GalleryError, GalleryResult},
    services::access_gate::{AccessGate, Action},
    stores::metadata_store::{MetadataError, MetadataStore, RecordField},
};
use std::sync::Arc;
use tracing::{debug, info};

const MAX_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct VisibilityToggle {
    metadata: Arc<dyn MetadataStore>,
}

impl VisibilityToggle {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Flip the photo's visibility and return the new value.
    pub async fn toggle(&self, gate: &AccessGate, photo_id: &str) -> GalleryResult<bool> {
        gate.authorize(Action::ToggleVisibility)?;

        for attempt in 1..=MAX_ATTEMPTS {
            let current = self
                .metadata
                .get(photo_id)
                .await
                .map_err(|err| map_metadata_error(photo_id, err))?;
            let target = !current.is_public;

            match self
                .metadata
                .update_field(
                    photo_id,
                    RecordField::IsPublic(target),
                    Some(RecordField::IsPublic(current.is_public)),
                )
                .await
            {
                Ok(()) => {
                    info!("photo {} is_public set to {}", photo_id, target);
                    return Ok(target);
                }
                Err(MetadataError::Conflict(_)) => {
                    debug!("toggle of {} lost a race (attempt {})", photo_id, attempt);
                }
                Err(err) => return Err(map_metadata_error(photo_id, err)),
            }
        }

        Err(GalleryError::Conflict(photo_id.to_string()))
    }
}

fn map_metadata_error(photo_id: &str, err: MetadataError) -> GalleryError {
    match err {
        MetadataError::NotFound(_) => GalleryError::NotFound(format!("photo {} not found", photo_id)),
        MetadataError::Conflict(_) => GalleryError::Conflict(photo_id.to_string()),
        other => GalleryError::StoreUnavailable(Box::new(other)),
    }
}
