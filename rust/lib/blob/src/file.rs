use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error::BlobError;
use crate::key;
use crate::traits::{BlobMeta, BlobStore, TransferProgress};

/// Default transfer chunk: progress is reported and cancellation checked
/// once per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Committed blobs live under this directory, in-flight uploads under
/// `STAGING_DIR`, so no key can name a partial file.
const OBJECTS_DIR: &str = "objects";
const STAGING_DIR: &str = "staging";

static NEXT_PARTIAL: AtomicU64 = AtomicU64::new(0);

fn io(e: std::io::Error) -> BlobError {
    BlobError::Io(e.to_string())
}

/// FileStore is a BlobStore implementation backed by the local filesystem.
///
/// Keys are mapped to paths under `{base_dir}/objects`:
///   key "materials/CSE-2A/1718000000000_notes.pdf"
///   → `{base_dir}/objects/materials/CSE-2A/1718000000000_notes.pdf`
///
/// Uploads are written chunk by chunk to a file in `{base_dir}/staging` and
/// renamed into place once complete, so readers never observe a
/// half-written blob.
pub struct FileStore {
    base_dir: PathBuf,
    staging_dir: PathBuf,
    bucket: String,
    chunk_size: usize,
}

impl FileStore {
    /// Create a new FileStore rooted at `base_dir`, issuing URLs under
    /// `bucket`. The directory is created if it doesn't exist.
    pub fn open(base_dir: &Path, bucket: &str) -> Result<Self, BlobError> {
        let objects = base_dir.join(OBJECTS_DIR);
        let staging = base_dir.join(STAGING_DIR);
        std::fs::create_dir_all(&objects).map_err(io)?;
        std::fs::create_dir_all(&staging).map_err(io)?;
        Ok(Self {
            base_dir: objects,
            staging_dir: staging,
            bucket: bucket.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Resolve a key to a filesystem path. Rejects keys that escape base_dir.
    async fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        key::validate(key)?;

        let path = self.base_dir.join(key);
        let canonical_base = fs::canonicalize(&self.base_dir).await.map_err(io)?;

        // Symlinks inside the tree could still point outside: check the
        // deepest existing ancestor.
        let mut ancestor = path.clone();
        while !fs::try_exists(&ancestor).await.map_err(io)? {
            match ancestor.parent() {
                Some(parent) => ancestor = parent.to_path_buf(),
                None => break,
            }
        }
        let canonical = fs::canonicalize(&ancestor).await.map_err(io)?;
        if !canonical.starts_with(&canonical_base) {
            return Err(BlobError::InvalidKey(format!(
                "path traversal detected in key: {:?}",
                key
            )));
        }
        Ok(path)
    }

    async fn write_chunks(
        &self,
        partial: &Path,
        data: &[u8],
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), BlobError> {
        let total = data.len() as u64;
        let mut file = fs::File::create(partial).await.map_err(io)?;
        let mut written = 0u64;
        progress(TransferProgress {
            bytes_transferred: 0,
            total_bytes: total,
        });

        for chunk in data.chunks(self.chunk_size) {
            if cancel.is_cancelled() {
                return Err(BlobError::Cancelled);
            }
            file.write_all(chunk).await.map_err(io)?;
            written += chunk.len() as u64;
            progress(TransferProgress {
                bytes_transferred: written,
                total_bytes: total,
            });
            tokio::task::yield_now().await;
        }

        file.sync_all().await.map_err(io)?;
        if cancel.is_cancelled() {
            return Err(BlobError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FileStore {
    fn reports_progress(&self) -> bool {
        true
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<BlobMeta, BlobError> {
        let path = self.resolve(key).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io)?;
        }

        let partial = self.staging_dir.join(format!(
            "{}-{}.part",
            std::process::id(),
            NEXT_PARTIAL.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = self.write_chunks(&partial, data, progress, cancel).await {
            let _ = fs::remove_file(&partial).await;
            if e == BlobError::Cancelled {
                tracing::debug!(key, "blob upload cancelled");
            }
            return Err(e);
        }
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(io(e));
        }

        tracing::debug!(key, size = data.len(), "blob stored");
        Ok(BlobMeta {
            key: key.to_string(),
            size: data.len() as u64,
            url: self.url(key),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let path = self.resolve(key).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io(e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        let path = self.resolve(key).await?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io(e)),
        }
    }

    fn url(&self, key: &str) -> String {
        key::to_url(&self.bucket, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key::from_url(&self.bucket, url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn no_progress(_: TransferProgress) {}

    fn store(dir: &tempfile::TempDir) -> FileStore {
        FileStore::open(dir.path(), "test").unwrap().with_chunk_size(4)
    }

    #[tokio::test]
    async fn put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let cancel = CancellationToken::new();

        let meta = store
            .put("materials/A/1_notes.pdf", b"hello world", &no_progress, &cancel)
            .await
            .unwrap();
        assert_eq!(meta.size, 11);
        assert_eq!(meta.url, "blob://test/materials/A/1_notes.pdf");
        assert!(store.exists("materials/A/1_notes.pdf").await.unwrap());
        assert_eq!(
            store.get("materials/A/1_notes.pdf").await.unwrap().unwrap(),
            b"hello world"
        );

        store.delete("materials/A/1_notes.pdf").await.unwrap();
        assert!(!store.exists("materials/A/1_notes.pdf").await.unwrap());
        assert!(store.get("materials/A/1_notes.pdf").await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete("materials/A/1_notes.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn progress_is_chunked_and_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let seen = Mutex::new(Vec::new());
        let record = |p: TransferProgress| seen.lock().unwrap().push(p.bytes_transferred);

        store
            .put("k/file.bin", &[7u8; 10], &record, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 4, 8, 10]);
    }

    #[tokio::test]
    async fn cancelled_upload_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let cancel_midway = move |p: TransferProgress| {
            if p.bytes_transferred >= 4 {
                trigger.cancel();
            }
        };

        let err = store
            .put("k/file.bin", &[1u8; 16], &cancel_midway, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, BlobError::Cancelled);
        assert!(!store.exists("k/file.bin").await.unwrap());
        assert!(!dir.path().join("objects/k/file.bin").exists());
        assert_eq!(std::fs::read_dir(dir.path().join("staging")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let cancel = CancellationToken::new();
        for bad in ["../escape", "/etc/passwd", "a/../../b"] {
            let err = store.put(bad, b"x", &no_progress, &cancel).await.unwrap_err();
            assert!(matches!(err, BlobError::InvalidKey(_)), "{}", bad);
        }
    }

    #[tokio::test]
    async fn staging_names_do_not_collide_with_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let cancel = CancellationToken::new();
        store
            .put("k/lecture.part", b"partial-looking", &no_progress, &cancel)
            .await
            .unwrap();
        store.put("k/lecture", b"plain", &no_progress, &cancel).await.unwrap();

        assert_eq!(store.get("k/lecture.part").await.unwrap().unwrap(), b"partial-looking");
        assert_eq!(store.get("k/lecture").await.unwrap().unwrap(), b"plain");
        assert!(dir.path().join("objects/k/lecture.part").is_file());
        assert_eq!(std::fs::read_dir(dir.path().join("staging")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn url_resolves_back_to_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let url = store.url("materials/A/1_x.pdf");
        assert_eq!(store.key_from_url(&url).as_deref(), Some("materials/A/1_x.pdf"));
        assert_eq!(store.key_from_url("blob://elsewhere/materials/A/1_x.pdf"), None);
    }

    #[tokio::test]
    async fn empty_blob_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store
            .put("k/empty.txt", b"", &no_progress, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(store.get("k/empty.txt").await.unwrap().unwrap(), Vec::<u8>::new());
    }
}
