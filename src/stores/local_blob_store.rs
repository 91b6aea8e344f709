//! src/stores/local_blob_store.rs
//!
//! LocalBlobStore — photo bytes on local disk, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. Reads are granted through
//! HMAC-signed URLs issued by [`UrlSigner`].

use crate::stores::{
    blob_store::{BlobError, BlobReader, BlobResult, BlobStore},
    url_signer::UrlSigner,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const TMP_PREFIX: &str = ".tmp-";

#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    /// Directory holding every object of the bucket.
    bucket_root: PathBuf,
    bucket: String,
    signer: UrlSigner,
}

impl LocalBlobStore {
    /// Create a store rooted at `base_path/bucket`. The directory is created
    /// lazily on first write.
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>, signer: UrlSigner) -> Self {
        let bucket = bucket.into();
        let mut bucket_root = base_path.into();
        bucket_root.push(&bucket);
        Self {
            bucket_root,
            bucket,
            signer,
        }
    }

    pub fn bucket_root(&self) -> &Path {
        &self.bucket_root
    }

    /// Reject keys that could escape the bucket directory.
    fn ensure_key_safe(&self, key: &str) -> BlobResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(BlobError::InvalidKey);
        }
        if key.starts_with(TMP_PREFIX) || key.contains('/') || key.contains("..") {
            return Err(BlobError::InvalidKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(BlobError::InvalidKey);
        }
        Ok(())
    }

    /// Two-level shard identifiers: the first two bytes of MD5(bucket/key)
    /// as lowercase hex. Keeps the file count per directory low.
    fn object_shards(bucket: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.bucket, key);
        let mut path = self.bucket_root.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Recursively remove empty shard directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.bucket_root) && current != self.bucket_root {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// Write to a temp file, fsync, then rename into place so readers never
    /// observe a partial object.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> BlobResult<()> {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!("{}{}", TMP_PREFIX, Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }

        debug!(
            "stored {} ({} bytes, {}) at {}",
            key,
            bytes.len(),
            content_type,
            file_path.display()
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BlobError::NotFound(key.to_string()));
            }
            Err(err) => return Err(BlobError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    fn signed_read_url(&self, key: &str, ttl: Duration) -> String {
        self.signer.sign(key, ttl)
    }

    fn verify_signed_read(&self, key: &str, expires: i64, signature: &str) -> BlobResult<()> {
        self.ensure_key_safe(key)?;
        if self.signer.verify(key, expires, signature) {
            Ok(())
        } else {
            Err(BlobError::InvalidSignature)
        }
    }

    async fn open(&self, key: &str) -> BlobResult<BlobReader> {
        self.ensure_key_safe(key)?;
        let file = File::open(self.object_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound(key.to_string())
            } else {
                BlobError::Io(err)
            }
        })?;
        Ok(Box::pin(file))
    }

    /// Walk both shard levels; temp files from in-progress writes are skipped.
    async fn list_keys(&self) -> BlobResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut shards_a = match fs::read_dir(&self.bucket_root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(err) => return Err(BlobError::Io(err)),
        };
        while let Some(shard_a) = shards_a.next_entry().await? {
            if !shard_a.file_type().await?.is_dir() {
                continue;
            }
            let mut shards_b = fs::read_dir(shard_a.path()).await?;
            while let Some(shard_b) = shards_b.next_entry().await? {
                if !shard_b.file_type().await?.is_dir() {
                    continue;
                }
                let mut objects = fs::read_dir(shard_b.path()).await?;
                while let Some(object) = objects.next_entry().await? {
                    if !object.file_type().await?.is_file() {
                        continue;
                    }
                    if let Some(name) = object.file_name().to_str() {
                        if !name.starts_with(TMP_PREFIX) {
                            keys.push(name.to_string());
                        }
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn health_check(&self) -> BlobResult<()> {
        fs::create_dir_all(&self.bucket_root).await?;
        let tmp_path = self
            .bucket_root
            .join(format!("{}readyz-{}", TMP_PREFIX, Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? == b"readyz" {
            Ok(())
        } else {
            Err(BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "file content mismatch",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn store(dir: &TempDir) -> LocalBlobStore {
        let signer = UrlSigner::new(b"k", "http://localhost:3000").unwrap();
        LocalBlobStore::new(dir.path(), "photos", signer)
    }

    #[tokio::test]
    async fn put_open_and_delete_object() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        store
            .put("a.png", Bytes::from_static(b"png-bytes"), "image/png")
            .await
            .unwrap();

        let mut reader = store.open("a.png").await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        assert_eq!(contents, b"png-bytes");
        assert_eq!(store.list_keys().await.unwrap(), vec!["a.png".to_string()]);

        store.delete("a.png").await.unwrap();
        assert!(matches!(store.open("a.png").await, Err(BlobError::NotFound(_))));
        assert!(store.list_keys().await.unwrap().is_empty());
        // shard directories are pruned back to the bucket root
        let mut remaining = fs::read_dir(store.bucket_root()).await.unwrap();
        assert!(remaining.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_missing_object_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.delete("missing.gif").await,
            Err(BlobError::NotFound(key)) if key == "missing.gif"
        ));
    }

    #[tokio::test]
    async fn unsafe_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        for key in ["", "../escape.png", "nested/key.png", "back\\slash", ".tmp-x"] {
            assert!(
                matches!(
                    store.put(key, Bytes::from_static(b"x"), "image/png").await,
                    Err(BlobError::InvalidKey)
                ),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[tokio::test]
    async fn list_keys_on_fresh_bucket_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signed_url_round_trips_through_verification() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let url = store.signed_read_url("a.png", Duration::from_secs(60));
        let query = url.split_once('?').unwrap().1;
        let mut expires = 0;
        let mut signature = "";
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => signature = v,
                _ => {}
            }
        }
        store.verify_signed_read("a.png", expires, signature).unwrap();
        assert!(matches!(
            store.verify_signed_read("b.png", expires, signature),
            Err(BlobError::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn health_check_leaves_no_objects_behind() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.health_check().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
    }
}
