//! Metadata storage abstraction for photo records.

use crate::models::photo::{PhotoRecord, UploadIntent};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("photo `{0}` not found")]
    NotFound(String),
    #[error("photo `{0}` was modified concurrently")]
    Conflict(String),
    #[error("table name `{0}` is invalid")]
    InvalidTableName(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// A single mutable field of a [`PhotoRecord`] together with its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    IsPublic(bool),
}

/// Keyed record storage. Each call is atomic for its own key; there is no
/// transaction spanning keys or spanning the blob store.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, photo_id: &str) -> MetadataResult<PhotoRecord>;

    /// Insert the record, overwriting any record with the same id.
    async fn put(&self, record: &PhotoRecord) -> MetadataResult<()>;

    /// Set one field. When `expected` is given the write only applies if the
    /// stored value still equals it, otherwise `Conflict`.
    async fn update_field(
        &self,
        photo_id: &str,
        value: RecordField,
        expected: Option<RecordField>,
    ) -> MetadataResult<()>;

    async fn delete(&self, photo_id: &str) -> MetadataResult<()>;

    async fn scan_all(&self) -> MetadataResult<Vec<PhotoRecord>>;

    /// Persist an upload intent for `photo_id` before its blob is written.
    async fn record_intent(&self, photo_id: &str) -> MetadataResult<()>;

    /// Drop the intent for `photo_id`. Clearing a missing intent is a no-op.
    async fn clear_intent(&self, photo_id: &str) -> MetadataResult<()>;

    async fn list_intents(&self) -> MetadataResult<Vec<UploadIntent>>;

    /// Create tables if they do not exist yet.
    async fn migrate(&self) -> MetadataResult<()>;

    async fn health_check(&self) -> MetadataResult<()>;
}
