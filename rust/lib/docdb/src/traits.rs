use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::changes::ChangeEvent;
use crate::document::Document;
use crate::error::DocError;
use crate::query::Query;

/// DocumentStore is the document-database contract the client relies on.
///
/// Documents are JSON objects addressed by `(collection, id)`. Any field set
/// to [`server_timestamp()`](crate::server_timestamp) is stamped with the
/// store's commit clock. Every committed write is announced on the change
/// feed returned by `changes()`.
///
/// Implementations may be remote; every data call is async.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document. Returns None if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocError>;

    /// Create or fully replace a document.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError>;

    /// Create a document, or deep-merge `data` into the existing one.
    /// Fields not named in `data` are never clobbered.
    async fn merge(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError>;

    /// Replace the named top-level fields of an existing document.
    /// Returns `DocError::NotFound` if the document does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Value)
        -> Result<Document, DocError>;

    /// Create a document under a freshly generated id.
    async fn add(&self, collection: &str, data: Value) -> Result<Document, DocError>;

    /// Delete a document. No-op if it does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocError>;

    /// Evaluate a filtered, ordered query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, DocError>;

    /// Subscribe to committed writes. Subscribe before reading to avoid
    /// missing a write that lands in between.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;
}
