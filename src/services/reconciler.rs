//! Reconciler — out-of-band repair sweep for partial two-phase writes.
//!
//! Snapshots are taken in the order records, blob keys, intents. Uploads
//! write intent, blob, record, then clear the intent, so:
//! - a record seen in the scan has its blob in the later listing unless the
//!   blob really is gone;
//! - a listed blob without a scanned record either still has its intent in
//!   the later intent listing or has had its record written since the scan.
//!
//! The second case is caught by re-reading the record right before a blob is
//! deleted.

use crate::{
    errors::{GalleryError, GalleryResult},
    stores::{
        blob_store::{BlobError, BlobStore},
        metadata_store::{MetadataError, MetadataStore},
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Blobs with no matching record that were deleted.
    pub orphan_blobs_removed: usize,
    /// Records whose blob was missing that were deleted.
    pub orphan_records_removed: usize,
    /// Upload intents cleared.
    pub intents_cleared: usize,
    /// Blobs left alone because their upload may still be in flight.
    pub in_flight_skipped: usize,
}

#[derive(Clone)]
pub struct Reconciler {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    grace: Duration,
}

impl Reconciler {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>, grace: Duration) -> Self {
        Self {
            blobs,
            metadata,
            grace,
        }
    }

    pub async fn run(&self) -> GalleryResult<ReconcileReport> {
        let records = self.metadata.scan_all().await.map_err(unavailable)?;
        let blob_keys: HashSet<String> = self
            .blobs
            .list_keys()
            .await
            .map_err(|err| GalleryError::StoreUnavailable(Box::new(err)))?
            .into_iter()
            .collect();
        let intents = self.metadata.list_intents().await.map_err(unavailable)?;

        let record_ids: HashSet<&str> = records.iter().map(|r| r.photo_id.as_str()).collect();
        let cutoff = chrono::Duration::from_std(self.grace)
            .ok()
            .and_then(|grace| Utc::now().checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let intent_age: HashMap<&str, bool> = intents
            .iter()
            .map(|i| (i.photo_id.as_str(), i.created_at <= cutoff))
            .collect();

        let mut report = ReconcileReport::default();

        for key in &blob_keys {
            if record_ids.contains(key.as_str()) {
                continue;
            }
            if intent_age.get(key.as_str()) == Some(&false) {
                report.in_flight_skipped += 1;
                continue;
            }
            // the upload may have committed after the scan
            match self.metadata.get(key).await {
                Err(MetadataError::NotFound(_)) => {}
                Ok(_) => {
                    debug!("blob {} gained its record during the sweep", key);
                    continue;
                }
                Err(err) => {
                    warn!("could not re-check record for blob {}: {}", key, err);
                    continue;
                }
            }
            match self.blobs.delete(key).await {
                Ok(()) | Err(BlobError::NotFound(_)) => {
                    warn!("removed orphan blob {}", key);
                    report.orphan_blobs_removed += 1;
                }
                Err(err) => warn!("could not remove orphan blob {}: {}", key, err),
            }
        }

        for record in &records {
            if blob_keys.contains(&record.photo_id) {
                continue;
            }
            match self.metadata.delete(&record.photo_id).await {
                Ok(()) => {
                    warn!("removed record {} whose blob is missing", record.photo_id);
                    report.orphan_records_removed += 1;
                }
                // deleted concurrently, nothing left to repair
                Err(MetadataError::NotFound(_)) => {}
                Err(err) => warn!("could not remove orphan record {}: {}", record.photo_id, err),
            }
        }

        for intent in &intents {
            let settled = record_ids.contains(intent.photo_id.as_str());
            let expired = intent.created_at <= cutoff;
            if !(settled || expired) {
                continue;
            }
            match self.metadata.clear_intent(&intent.photo_id).await {
                Ok(()) => report.intents_cleared += 1,
                Err(err) => warn!("could not clear intent {}: {}", intent.photo_id, err),
            }
        }

        info!(
            "reconciliation finished: {} orphan blobs, {} orphan records, {} intents cleared, {} in flight",
            report.orphan_blobs_removed,
            report.orphan_records_removed,
            report.intents_cleared,
            report.in_flight_skipped
        );
        Ok(report)
    }
}

fn unavailable(err: MetadataError) -> GalleryError {
    GalleryError::StoreUnavailable(Box::new(err))
}
