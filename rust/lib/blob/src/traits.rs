use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BlobError;

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobMeta {
    pub key: String,
    pub size: u64,
    /// Durable URL that resolves back to this blob.
    pub url: String,
}

/// Bytes moved so far out of the total for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Whole percent, rounded to nearest. An empty transfer is complete.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let done = self.bytes_transferred.min(self.total_bytes) as f64;
        (done / self.total_bytes as f64 * 100.0).round() as u8
    }
}

/// BlobStore provides storage for uploaded study materials.
///
/// Keys are path-like strings: `materials/CSE-2A/1718000000000_notes.pdf`.
/// Every stored blob has a durable URL (`url(key)`) that is what the
/// material record keeps; `key_from_url` maps it back for deletion and
/// download.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether `put` reports intermediate progress. Stores that upload in one
    /// shot only report completion.
    fn reports_progress(&self) -> bool;

    /// Store a blob, overwriting any existing one. `progress` is called with
    /// non-decreasing byte counts. When `cancel` fires before the last byte
    /// is committed the partial upload is discarded and
    /// `BlobError::Cancelled` is returned.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<BlobMeta, BlobError>;

    /// Retrieve a blob. Returns None if the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. No-op if the key does not exist.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &str) -> Result<bool, BlobError>;

    /// Durable URL for a key.
    fn url(&self, key: &str) -> String;

    /// Resolve a URL issued by this store back to its key.
    fn key_from_url(&self, url: &str) -> Option<String>;
}
