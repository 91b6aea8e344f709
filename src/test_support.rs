//! Shared fixtures for service and handler tests: real stores in a temp
//! directory, plus wrappers that inject store failures on demand.

use crate::{
    models::photo::{PhotoRecord, UploadIntent},
    services::access_gate::AccessGate,
    stores::{
        blob_store::{BlobError, BlobReader, BlobResult, BlobStore},
        local_blob_store::LocalBlobStore,
        metadata_store::{MetadataResult, MetadataStore, RecordField},
        sqlite_metadata_store::SqliteMetadataStore,
        url_signer::UrlSigner,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;

pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR\0\0\0\x01\0\0\0\x01\x08\x06\0\0\0";
pub const JPEG_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0\x01\x01\0\0\x01\0\x01\0\0";
pub const GIF_BYTES: &[u8] = b"GIF89a\x01\0\x01\0\x80\0\0\xff\xff\xff\0\0\0!";
pub const TEXT_BYTES: &[u8] = b"hello, this is just a plain text file\n";

pub fn admin() -> AccessGate {
    AccessGate::resolve(vec!["ADMIN".into()], "ADMIN")
}

pub fn standard_user() -> AccessGate {
    AccessGate::resolve(vec!["USER".into()], "ADMIN")
}

/// Real on-disk stores wrapped in failure injectors.
pub struct TestStores {
    _dir: TempDir,
    pub blobs: Arc<FlakyBlobStore>,
    pub metadata: Arc<FlakyMetadataStore>,
}

impl TestStores {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let signer = UrlSigner::new(b"test-key", "http://gallery.test").unwrap();
        let blobs = LocalBlobStore::new(dir.path().join("blobs"), "photos", signer);

        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("meta.db"))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let metadata = SqliteMetadataStore::new(Arc::new(pool), "photos").unwrap();
        metadata.migrate().await.unwrap();

        Self {
            _dir: dir,
            blobs: Arc::new(FlakyBlobStore::new(blobs)),
            metadata: Arc::new(FlakyMetadataStore::new(metadata)),
        }
    }

    pub fn blob_store(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    pub fn metadata_store(&self) -> Arc<dyn MetadataStore> {
        self.metadata.clone()
    }

    pub async fn blob_keys(&self) -> Vec<String> {
        let mut keys = self.blobs.list_keys().await.unwrap();
        keys.sort();
        keys
    }

    pub async fn records(&self) -> Vec<PhotoRecord> {
        self.metadata.scan_all().await.unwrap()
    }
}

fn injected() -> io::Error {
    io::Error::other("injected failure")
}

pub struct FlakyBlobStore {
    inner: LocalBlobStore,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FlakyBlobStore {
    fn new(inner: LocalBlobStore) -> Self {
        Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    /// Write straight to the underlying store, bypassing injection.
    pub async fn seed(&self, key: &str, bytes: &'static [u8]) {
        self.inner
            .put(key, Bytes::from_static(bytes), "application/octet-stream")
            .await
            .unwrap();
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(BlobError::Io(injected()));
        }
        self.inner.put(key, bytes, content_type).await
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BlobError::Io(injected()));
        }
        self.inner.delete(key).await
    }

    fn signed_read_url(&self, key: &str, ttl: Duration) -> String {
        self.inner.signed_read_url(key, ttl)
    }

    fn verify_signed_read(&self, key: &str, expires: i64, signature: &str) -> BlobResult<()> {
        self.inner.verify_signed_read(key, expires, signature)
    }

    async fn open(&self, key: &str) -> BlobResult<BlobReader> {
        self.inner.open(key).await
    }

    async fn list_keys(&self) -> BlobResult<Vec<String>> {
        self.inner.list_keys().await
    }

    async fn health_check(&self) -> BlobResult<()> {
        self.inner.health_check().await
    }
}

pub struct FlakyMetadataStore {
    inner: SqliteMetadataStore,
    pub fail_put: AtomicBool,
    pub fail_scan: AtomicBool,
    pub fail_intent: AtomicBool,
    pub fail_clear_intent: AtomicBool,
    /// Number of upcoming conditional updates that find `is_public` flipped
    /// behind the caller's back, simulating a concurrent toggler.
    pub rival_flips: AtomicUsize,
    /// Upload that commits (record written, intent cleared) right after the
    /// next `scan_all` has taken its snapshot.
    pub commit_after_scan: Mutex<Option<PhotoRecord>>,
}

impl FlakyMetadataStore {
    fn new(inner: SqliteMetadataStore) -> Self {
        Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
            fail_intent: AtomicBool::new(false),
            fail_clear_intent: AtomicBool::new(false),
            rival_flips: AtomicUsize::new(0),
            commit_after_scan: Mutex::new(None),
        }
    }

    pub async fn seed(&self, record: &PhotoRecord) {
        self.inner.put(record).await.unwrap();
    }
}

#[async_trait]
impl MetadataStore for FlakyMetadataStore {
    async fn get(&self, photo_id: &str) -> MetadataResult<PhotoRecord> {
        self.inner.get(photo_id).await
    }

    async fn put(&self, record: &PhotoRecord) -> MetadataResult<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(injected()).into());
        }
        self.inner.put(record).await
    }

    async fn update_field(
        &self,
        photo_id: &str,
        value: RecordField,
        expected: Option<RecordField>,
    ) -> MetadataResult<()> {
        let raced = self
            .rival_flips
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if raced {
            let current = self.inner.get(photo_id).await?;
            self.inner
                .update_field(photo_id, RecordField::IsPublic(!current.is_public), None)
                .await?;
        }
        self.inner.update_field(photo_id, value, expected).await
    }

    async fn delete(&self, photo_id: &str) -> MetadataResult<()> {
        self.inner.delete(photo_id).await
    }

    async fn scan_all(&self) -> MetadataResult<Vec<PhotoRecord>> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(injected()).into());
        }
        let snapshot = self.inner.scan_all().await?;
        let pending = self.commit_after_scan.lock().unwrap().take();
        if let Some(record) = pending {
            self.inner.put(&record).await?;
            self.inner.clear_intent(&record.photo_id).await?;
        }
        Ok(snapshot)
    }

    async fn record_intent(&self, photo_id: &str) -> MetadataResult<()> {
        if self.fail_intent.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(injected()).into());
        }
        self.inner.record_intent(photo_id).await
    }

    async fn clear_intent(&self, photo_id: &str) -> MetadataResult<()> {
        if self.fail_clear_intent.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Io(injected()).into());
        }
        self.inner.clear_intent(photo_id).await
    }

    async fn list_intents(&self) -> MetadataResult<Vec<UploadIntent>> {
        self.inner.list_intents().await
    }

    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }
}
