//! Write path shared by the embedded stores.
//!
//! Backends only provide raw row access (`RawStore`); `Engine` layers the
//! document semantics on top: sentinel resolution, merge/update rules,
//! serialized read-modify-write, and change announcements.

use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::changes::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::document::{
    merge_fields, new_id, resolve_server_values, update_fields, Document, ServerClock,
};
use crate::error::DocError;
use crate::query::Query;

pub(crate) trait RawStore: Send + Sync {
    fn read(&self, collection: &str, id: &str) -> Result<Option<Value>, DocError>;
    fn write(&self, collection: &str, id: &str, data: &Value) -> Result<(), DocError>;
    /// Returns whether a row was removed.
    fn remove(&self, collection: &str, id: &str) -> Result<bool, DocError>;
    fn scan(&self, collection: &str) -> Result<Vec<(String, Value)>, DocError>;
}

pub(crate) struct Engine<R: RawStore> {
    raw: R,
    clock: ServerClock,
    feed: ChangeFeed,
    write_lock: Mutex<()>,
}

fn check_path(collection: &str, id: &str) -> Result<(), DocError> {
    if collection.is_empty() || collection.contains('/') {
        return Err(DocError::InvalidQuery(format!(
            "invalid collection name: {:?}",
            collection
        )));
    }
    if id.is_empty() || id.contains('/') {
        return Err(DocError::InvalidQuery(format!("invalid document id: {:?}", id)));
    }
    Ok(())
}

fn require_object(data: &Value) -> Result<(), DocError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(DocError::Serialization(
            "document body must be a JSON object".into(),
        ))
    }
}

impl<R: RawStore> Engine<R> {
    pub(crate) fn new(raw: R) -> Self {
        Self {
            raw,
            clock: ServerClock::new(),
            feed: ChangeFeed::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub(crate) fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocError> {
        check_path(collection, id)?;
        Ok(self
            .raw
            .read(collection, id)?
            .map(|data| Document::new(id, data)))
    }

    pub(crate) fn set(&self, collection: &str, id: &str, mut data: Value) -> Result<Document, DocError> {
        check_path(collection, id)?;
        require_object(&data)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let existed = self.raw.read(collection, id)?.is_some();
        resolve_server_values(&mut data, self.clock.now_micros());
        self.raw.write(collection, id, &data)?;
        self.announce(collection, id, existed);
        Ok(Document::new(id, data))
    }

    pub(crate) fn merge(&self, collection: &str, id: &str, mut data: Value) -> Result<Document, DocError> {
        check_path(collection, id)?;
        require_object(&data)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        resolve_server_values(&mut data, self.clock.now_micros());
        let existing = self.raw.read(collection, id)?;
        let existed = existing.is_some();
        let mut body = existing.unwrap_or_else(|| Value::Object(Default::default()));
        merge_fields(&mut body, &data);
        self.raw.write(collection, id, &body)?;
        self.announce(collection, id, existed);
        Ok(Document::new(id, body))
    }

    pub(crate) fn update(&self, collection: &str, id: &str, mut fields: Value) -> Result<Document, DocError> {
        check_path(collection, id)?;
        require_object(&fields)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut body = self
            .raw
            .read(collection, id)?
            .ok_or_else(|| DocError::NotFound(format!("{}/{}", collection, id)))?;
        resolve_server_values(&mut fields, self.clock.now_micros());
        if let Some(map) = fields.as_object() {
            update_fields(&mut body, map);
        }
        self.raw.write(collection, id, &body)?;
        self.feed.publish(collection, id, ChangeKind::Updated);
        Ok(Document::new(id, body))
    }

    pub(crate) fn add(&self, collection: &str, data: Value) -> Result<Document, DocError> {
        self.set(collection, &new_id(), data)
    }

    pub(crate) fn delete(&self, collection: &str, id: &str) -> Result<(), DocError> {
        check_path(collection, id)?;
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.raw.remove(collection, id)? {
            self.feed.publish(collection, id, ChangeKind::Deleted);
        }
        Ok(())
    }

    pub(crate) fn query(&self, query: &Query) -> Result<Vec<Document>, DocError> {
        query.validate()?;
        let docs = self
            .raw
            .scan(query.collection_name())?
            .into_iter()
            .map(|(id, data)| Document::new(id, data))
            .collect();
        Ok(query.apply(docs))
    }

    pub(crate) fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn announce(&self, collection: &str, id: &str, existed: bool) {
        let kind = if existed {
            ChangeKind::Updated
        } else {
            ChangeKind::Created
        };
        self.feed.publish(collection, id, kind);
    }
}
