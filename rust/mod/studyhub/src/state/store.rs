use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::pattern;
use super::State;

/// A type-erased, reference-counted state value. Clone is an Arc clone.
#[derive(Clone)]
pub struct StateValue {
    inner: Arc<dyn Any + Send + Sync>,
}

impl StateValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Shared handle to the value, if it is a `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateValue")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

/// Handle returned by `StateStore::subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback type for state change notifications.
pub type ChangeHandler = Arc<dyn Fn(&str, &StateValue) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    pattern: String,
    handler: ChangeHandler,
}

/// Per-path state store with pattern subscriptions.
///
/// `set` stores a value and then calls every matching subscriber
/// synchronously, on the caller's thread, after all internal locks are
/// released. A handler may therefore read or set other paths.
pub struct StateStore {
    values: RwLock<BTreeMap<String, StateValue>>,
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(BTreeMap::new()),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Set a value at `path` and notify matching subscribers.
    pub fn set<T: Any + Send + Sync>(&self, path: &str, value: T) {
        self.set_value(path, StateValue::new(value));
    }

    pub fn set_value(&self, path: &str, value: StateValue) {
        {
            let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
            values.insert(path.to_string(), value.clone());
        }
        let handlers: Vec<ChangeHandler> = {
            let subs = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            subs.iter()
                .filter(|s| pattern::matches(&s.pattern, path))
                .map(|s| s.handler.clone())
                .collect()
        };
        for handler in handlers {
            handler(path, &value);
        }
    }

    pub fn get(&self, path: &str) -> Option<StateValue> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(path).cloned()
    }

    /// Store a typed state at its path.
    pub fn put<T: State>(&self, value: T) {
        self.set(T::PATH, value);
    }

    /// Read the typed state at its path.
    pub fn read<T: State>(&self) -> Option<Arc<T>> {
        self.get(T::PATH)?.downcast::<T>()
    }

    /// Entries strictly below `prefix`, ordered by path.
    pub fn scan(&self, prefix: &str) -> Vec<(String, StateValue)> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        let scan_prefix = format!("{}/", prefix);
        values
            .range(scan_prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&scan_prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.keys().cloned().collect()
    }

    /// Subscribe to changes at paths matching `pattern`. Returns None for a
    /// pattern with a non-final `#`.
    pub fn subscribe<F>(&self, pattern: &str, handler: F) -> Option<SubscriptionId>
    where
        F: Fn(&str, &StateValue) + Send + Sync + 'static,
    {
        if !pattern::is_valid(pattern) {
            tracing::warn!(pattern, "invalid subscription pattern");
            return None;
        }
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subs.push(Subscriber {
            id,
            pattern: pattern.to_string(),
            handler: Arc::new(handler),
        });
        Some(id)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() < before
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
