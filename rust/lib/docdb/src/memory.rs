use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::changes::ChangeEvent;
use crate::document::Document;
use crate::engine::{Engine, RawStore};
use crate::error::DocError;
use crate::query::Query;
use crate::traits::DocumentStore;

/// MemoryDocs is a DocumentStore kept entirely in process memory.
/// Contents are lost when it is dropped.
pub struct MemoryDocs {
    engine: Engine<MemoryRaw>,
}

struct MemoryRaw {
    rows: RwLock<BTreeMap<(String, String), Value>>,
}

impl RawStore for MemoryRaw {
    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, DocError> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(&(collection.to_string(), id.to_string())).cloned())
    }

    fn write(&self, collection: &str, id: &str, data: &Value) -> Result<(), DocError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.insert((collection.to_string(), id.to_string()), data.clone());
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> Result<bool, DocError> {
        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .remove(&(collection.to_string(), id.to_string()))
            .is_some())
    }

    fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, DocError> {
        let rows = self.rows.read().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .range((collection.to_string(), String::new())..)
            .take_while(|((c, _), _)| c == collection)
            .map(|((_, id), v)| (id.clone(), v.clone()))
            .collect())
    }
}

impl MemoryDocs {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(MemoryRaw {
                rows: RwLock::new(BTreeMap::new()),
            }),
        }
    }
}

impl Default for MemoryDocs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocs {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeKind;
    use crate::document::server_timestamp;
    use crate::query::Direction;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete_lifecycle() {
        let docs = MemoryDocs::new();
        assert!(docs.get("users", "u1").await.unwrap().is_none());

        docs.set("users", "u1", json!({"name": "Asha"})).await.unwrap();
        let got = docs.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(got.data["name"], json!("Asha"));

        docs.delete("users", "u1").await.unwrap();
        assert!(docs.get("users", "u1").await.unwrap().is_none());
        // Deleting again is a no-op.
        docs.delete("users", "u1").await.unwrap();
    }

    #[tokio::test]
    async fn merge_creates_then_preserves_other_fields() {
        let docs = MemoryDocs::new();
        docs.merge("users", "u1", json!({"name": "Asha", "class": "CSE-2A"}))
            .await
            .unwrap();
        let merged = docs
            .merge("users", "u1", json!({"lastLogin": server_timestamp()}))
            .await
            .unwrap();
        assert_eq!(merged.data["class"], json!("CSE-2A"));
        assert!(merged.data["lastLogin"].is_i64());
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let docs = MemoryDocs::new();
        let err = docs
            .update("materials", "m1", json!({"category": "Book"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DocError::NotFound(_)));

        docs.set("materials", "m1", json!({"category": "Notes", "fileName": "a.pdf"}))
            .await
            .unwrap();
        let updated = docs
            .update("materials", "m1", json!({"category": "Book"}))
            .await
            .unwrap();
        assert_eq!(updated.data["category"], json!("Book"));
        assert_eq!(updated.data["fileName"], json!("a.pdf"));
    }

    #[tokio::test]
    async fn add_generates_distinct_ids() {
        let docs = MemoryDocs::new();
        let a = docs.add("materials", json!({"n": 1})).await.unwrap();
        let b = docs.add("materials", json!({"n": 2})).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn query_scopes_to_collection() {
        let docs = MemoryDocs::new();
        docs.set("materials", "m1", json!({"class": "A"})).await.unwrap();
        docs.set("materialsx", "m2", json!({"class": "A"})).await.unwrap();
        docs.set("users", "m3", json!({"class": "A"})).await.unwrap();

        let out = docs
            .query(&Query::collection("materials").where_eq("class", "A"))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "m1");
    }

    #[tokio::test]
    async fn server_timestamps_order_writes() {
        let docs = MemoryDocs::new();
        for name in ["first", "second", "third"] {
            docs.add("materials", json!({"fileName": name, "uploadDate": server_timestamp()}))
                .await
                .unwrap();
        }
        let out = docs
            .query(&Query::collection("materials").order_by("uploadDate", Direction::Descending))
            .await
            .unwrap();
        let names: Vec<_> = out.iter().map(|d| d.data["fileName"].clone()).collect();
        assert_eq!(names, vec![json!("third"), json!("second"), json!("first")]);
    }

    #[tokio::test]
    async fn writes_are_announced() {
        let docs = MemoryDocs::new();
        let mut rx = docs.changes();

        docs.set("users", "u1", json!({"a": 1})).await.unwrap();
        docs.set("users", "u1", json!({"a": 2})).await.unwrap();
        docs.delete("users", "u1").await.unwrap();
        docs.delete("users", "u1").await.unwrap();

        let kinds: Vec<_> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]
        );
        // The second delete removed nothing and announced nothing.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejects_non_object_bodies_and_bad_paths() {
        let docs = MemoryDocs::new();
        assert!(docs.set("users", "u1", json!([1, 2])).await.is_err());
        assert!(docs.set("users", "a/b", json!({})).await.is_err());
        assert!(docs.get("", "u1").await.is_err());
    }
}
