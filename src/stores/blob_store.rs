//! Blob storage abstraction for photo bytes.

use async_trait::async_trait;
use bytes::Bytes;
use std::{io, pin::Pin, time::Duration};
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid object key")]
    InvalidKey,
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("signed url is expired or invalid")]
    InvalidSignature,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Readable handle over a stored object.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Object storage keyed by string keys.
///
/// `put` and `delete` talk to durable storage and may fail; issuing a signed
/// read URL is a local computation and cannot.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<()>;

    /// Remove the object at `key`. Missing keys are `NotFound`.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Issue a read URL for `key` valid for `ttl`.
    fn signed_read_url(&self, key: &str, ttl: Duration) -> String;

    /// Check a URL issued by [`BlobStore::signed_read_url`].
    fn verify_signed_read(&self, key: &str, expires: i64, signature: &str) -> BlobResult<()>;

    /// Open the object at `key` for streaming.
    async fn open(&self, key: &str) -> BlobResult<BlobReader>;

    /// Every key currently stored, in no particular order.
    async fn list_keys(&self) -> BlobResult<Vec<String>>;

    /// Best-effort write/read/delete probe used by readiness checks.
    async fn health_check(&self) -> BlobResult<()>;
}
