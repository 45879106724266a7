use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BlobError;
use crate::key;
use crate::traits::{BlobMeta, BlobStore, TransferProgress};

/// MemoryStore keeps blobs in a map. Uploads land in one shot, so the only
/// progress report is completion.
pub struct MemoryStore {
    bucket: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    fn reports_progress(&self) -> bool {
        false
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<BlobMeta, BlobError> {
        key::validate(key)?;
        if cancel.is_cancelled() {
            return Err(BlobError::Cancelled);
        }
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), data.to_vec());
        let total = data.len() as u64;
        progress(TransferProgress {
            bytes_transferred: total,
            total_bytes: total,
        });
        Ok(BlobMeta {
            key: key.to_string(),
            size: total,
            url: self.url(key),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        key::validate(key)?;
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        key::validate(key)?;
        self.blobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        key::validate(key)?;
        Ok(self
            .blobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key))
    }

    fn url(&self, key: &str) -> String {
        key::to_url(&self.bucket, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        key::from_url(&self.bucket, url)
    }
}
