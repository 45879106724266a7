use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, TableDefinition};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::changes::ChangeEvent;
use crate::document::Document;
use crate::engine::{Engine, RawStore};
use crate::error::DocError;
use crate::query::Query;
use crate::traits::DocumentStore;

/// Rows keyed by `"{collection}/{id}"`, valued by the JSON body.
const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("docs");

/// RedbDocs is a DocumentStore persisted to a single redb file.
pub struct RedbDocs {
    engine: Engine<RedbRaw>,
}

struct RedbRaw {
    db: Arc<Database>,
}

fn storage(e: impl std::fmt::Display) -> DocError {
    DocError::Storage(e.to_string())
}

fn row_key(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, id)
}

fn decode_body(key: &str, bytes: &[u8]) -> Result<Value, DocError> {
    serde_json::from_slice(bytes).map_err(|e| DocError::Serialization(format!("{}: {}", key, e)))
}

impl RedbDocs {
    /// Open or create a document database at the given path.
    pub fn open(path: &Path) -> Result<Self, DocError> {
        let db = Database::create(path).map_err(storage)?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        tracing::debug!(path = %path.display(), "document database opened");
        Ok(Self {
            engine: Engine::new(RedbRaw { db: Arc::new(db) }),
        })
    }
}

impl RawStore for RedbRaw {
    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, DocError> {
        let key = row_key(collection, id);
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;

        match table.get(key.as_str()).map_err(storage)? {
            Some(val) => Ok(Some(decode_body(&key, val.value())?)),
            None => Ok(None),
        }
    }

    fn write(&self, collection: &str, id: &str, data: &Value) -> Result<(), DocError> {
        let key = row_key(collection, id);
        let bytes =
            serde_json::to_vec(data).map_err(|e| DocError::Serialization(e.to_string()))?;
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            table.insert(key.as_str(), bytes.as_slice()).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool, DocError> {
        let key = row_key(collection, id);
        let write_txn = self.db.begin_write().map_err(storage)?;
        let removed = {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            let old = table.remove(key.as_str()).map_err(storage)?;
            old.is_some()
        };
        write_txn.commit().map_err(storage)?;
        Ok(removed)
    }

    fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, DocError> {
        let prefix = format!("{}/", collection);
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;

        let mut results = Vec::new();
        let iter = table.range(prefix.as_str()..).map_err(storage)?;
        for entry in iter {
            let (key, value) = entry.map_err(storage)?;
            let key = key.value();
            let Some(id) = key.strip_prefix(prefix.as_str()) else {
                break;
            };
            results.push((id.to_string(), decode_body(key, value.value())?));
        }
        Ok(results)
    }
}

#[async_trait]
impl DocumentStore for RedbDocs {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocError> {
        self.engine.get(collection, id)
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError> {
        self.engine.set(collection, id, data)
    }

    async fn merge(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError> {
        self.engine.merge(collection, id, data)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Value,
    ) -> Result<Document, DocError> {
        self.engine.update(collection, id, fields)
    }

    async fn add(&self, collection: &str, data: Value) -> Result<Document, DocError> {
        self.engine.add(collection, data)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocError> {
        self.engine.delete(collection, id)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, DocError> {
        self.engine.query(query)
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.engine.changes()
    }
}
