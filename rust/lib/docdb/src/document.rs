use std::sync::atomic::{AtomicI64, Ordering};

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::DocError;

/// Key of the server-value sentinel object: `{".sv": "timestamp"}`.
const SERVER_VALUE_KEY: &str = ".sv";
const SERVER_VALUE_TIMESTAMP: &str = "timestamp";

/// A stored document: its id within the collection plus its JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Read a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Deserialize the body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DocError> {
        serde_json::from_value(self.data.clone())
            .map_err(|e| DocError::Serialization(format!("{}: {}", self.id, e)))
    }
}

/// Generate a new random document id (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Placeholder for "the store's clock at commit time".
///
/// Any field (at any depth) set to this value is replaced with the commit
/// timestamp, in microseconds since the Unix epoch, before the write lands.
pub fn server_timestamp() -> Value {
    json!({ SERVER_VALUE_KEY: SERVER_VALUE_TIMESTAMP })
}

fn is_server_timestamp(value: &Value) -> bool {
    match value.as_object() {
        Some(obj) => {
            obj.len() == 1
                && obj.get(SERVER_VALUE_KEY).and_then(Value::as_str) == Some(SERVER_VALUE_TIMESTAMP)
        }
        None => false,
    }
}

/// Replace every server-timestamp sentinel in `value` with `now_micros`.
pub(crate) fn resolve_server_values(value: &mut Value, now_micros: i64) {
    if is_server_timestamp(value) {
        *value = json!(now_micros);
        return;
    }
    match value {
        Value::Object(obj) => {
            for v in obj.values_mut() {
                resolve_server_values(v, now_micros);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                resolve_server_values(v, now_micros);
            }
        }
        _ => {}
    }
}

/// Deep-merge `patch` into `base`.
///
/// Nested objects are merged key by key. Every other value, `null`
/// included, overwrites. Keys absent from `patch` are left untouched.
pub(crate) fn merge_fields(base: &mut Value, patch: &Value) {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(base_obj), Some(patch_obj)) => {
            for (key, value) in patch_obj {
                match base_obj.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_fields(existing, value);
                    }
                    _ => {
                        base_obj.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        _ => *base = patch.clone(),
    }
}

/// Replace the given top-level fields of `base`, leaving the rest alone.
pub(crate) fn update_fields(base: &mut Value, fields: &Map<String, Value>) {
    if !base.is_object() {
        *base = Value::Object(Map::new());
    }
    if let Some(obj) = base.as_object_mut() {
        for (key, value) in fields {
            obj.insert(key.clone(), value.clone());
        }
    }
}

/// Commit clock. Timestamps are strictly increasing within one store even
/// when two writes land in the same microsecond, so ordering by a server
/// timestamp never ties for writes from the same store.
pub(crate) struct ServerClock {
    last: AtomicI64,
}

impl ServerClock {
    pub(crate) fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
        }
    }

    pub(crate) fn now_micros(&self) -> i64 {
        let wall = chrono::Utc::now().timestamp_micros();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_id_is_compact() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }

    #[test]
    fn server_timestamp_resolved_at_any_depth() {
        let mut doc = json!({
            "createdAt": server_timestamp(),
            "nested": {"at": server_timestamp()},
            "list": [server_timestamp(), 1],
            "plain": {".sv": "timestamp", "extra": true},
        });
        resolve_server_values(&mut doc, 42);
        assert_eq!(doc["createdAt"], json!(42));
        assert_eq!(doc["nested"]["at"], json!(42));
        assert_eq!(doc["list"], json!([42, 1]));
        // Not a sentinel: has an extra key.
        assert_eq!(doc["plain"]["extra"], json!(true));
    }

    #[test]
    fn merge_keeps_untouched_fields_and_stores_null() {
        let mut base = json!({"name": "A", "class": "CSE-2A", "meta": {"x": 1}});
        merge_fields(&mut base, &json!({"class": null, "meta": {"y": 2}}));
        assert_eq!(
            base,
            json!({"name": "A", "class": null, "meta": {"x": 1, "y": 2}})
        );
    }

    #[test]
    fn update_replaces_top_level_only() {
        let mut base = json!({"category": "Notes", "meta": {"x": 1}});
        let patch = json!({"meta": {"y": 2}});
        update_fields(&mut base, patch.as_object().unwrap());
        assert_eq!(base, json!({"category": "Notes", "meta": {"y": 2}}));
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = ServerClock::new();
        let mut prev = clock.now_micros();
        for _ in 0..1000 {
            let next = clock.now_micros();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn decode_reports_document_id() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Rec {
            name: String,
        }
        let doc = Document::new("abc", json!({"name": 5}));
        let err = doc.decode::<Rec>().unwrap_err();
        assert!(matches!(err, DocError::Serialization(msg) if msg.starts_with("abc")));
    }
}
