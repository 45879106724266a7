//! Live material list of one class.
//!
//! At most one subscription is active. Switching class tears the old one
//! down before the new one is acquired, and every published state carries
//! the generation of the subscription that produced it; a state whose
//! generation is no longer current is dropped, so nothing from a previous
//! class is visible after a switch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use studyhub_docdb::{Direction, Document, DocumentStore, LiveQuery, Query};

use crate::model::Material;
use crate::state::{FeedState, FeedStatus, StateStore};

/// Publishes feed states to the watch cell and the state store, admitting
/// only the current generation.
struct Publisher {
    store: Arc<StateStore>,
    feed: watch::Sender<FeedState>,
    current: Mutex<u64>,
}

impl Publisher {
    /// Start a new generation with `state` as its first value.
    fn begin(&self, state: FeedState) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = state.generation;
        self.feed.send_replace(state.clone());
        self.store.put(state);
    }

    fn publish(&self, state: FeedState) -> bool {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if *current != state.generation {
            debug!(generation = state.generation, current = *current, "stale feed state dropped");
            return false;
        }
        self.feed.send_replace(state.clone());
        self.store.put(state);
        true
    }
}

struct Active {
    class: String,
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Active {
    async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
        info!(class = %self.class, generation = self.generation, "subscription released");
    }
}

pub struct MaterialRepository {
    docs: Arc<dyn DocumentStore>,
    collection: String,
    publisher: Arc<Publisher>,
    active: tokio::sync::Mutex<Option<Active>>,
    next_generation: AtomicU64,
}

impl MaterialRepository {
    pub fn new(docs: Arc<dyn DocumentStore>, collection: &str, store: Arc<StateStore>) -> Self {
        let initial = FeedState::idle(0);
        let (feed, _) = watch::channel(initial.clone());
        store.put(initial);
        Self {
            docs,
            collection: collection.to_string(),
            publisher: Arc::new(Publisher {
                store,
                feed,
                current: Mutex::new(0),
            }),
            active: tokio::sync::Mutex::new(None),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn snapshot(&self) -> FeedState {
        self.publisher.feed.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.publisher.feed.subscribe()
    }

    /// Point the feed at `class`, or at nothing. A no-op when the feed is
    /// already healthy on that class.
    pub async fn switch_class(&self, class: Option<&str>) {
        let class = class
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let mut active = self.active.lock().await;
        let failed = matches!(self.publisher.feed.borrow().status, FeedStatus::Error(_));
        match (active.as_ref(), &class) {
            (Some(a), Some(c)) if a.class == *c && !failed => return,
            (None, None) => return,
            _ => {}
        }
        self.replace(&mut active, class).await;
    }

    /// Re-issue the subscription of the current class.
    pub async fn retry(&self) {
        let mut active = self.active.lock().await;
        let Some(class) = active.as_ref().map(|a| a.class.clone()) else {
            return;
        };
        info!(class = %class, "retrying subscription");
        self.replace(&mut active, Some(class)).await;
    }

    /// Release the subscription and go idle.
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        if active.is_some() {
            self.replace(&mut active, None).await;
        }
    }

    async fn replace(&self, active: &mut Option<Active>, class: Option<String>) {
        if let Some(old) = active.take() {
            old.stop().await;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let Some(class) = class else {
            self.publisher.begin(FeedState::idle(generation));
            return;
        };

        self.publisher.begin(FeedState {
            class: Some(class.clone()),
            status: FeedStatus::Loading,
            materials: Arc::from(Vec::new()),
            generation,
        });
        let query = Query::collection(self.collection.as_str())
            .where_eq("class", class.as_str())
            .order_by("uploadDate", Direction::Descending);
        let live = LiveQuery::spawn(self.docs.clone(), query);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(
            self.publisher.clone(),
            live,
            class.clone(),
            generation,
            cancel.clone(),
        ));
        info!(class = %class, generation, "subscription acquired");
        *active = Some(Active {
            class,
            generation,
            cancel,
            task,
        });
    }
}

fn decode(docs: &[Document]) -> Vec<Material> {
    docs.iter()
        .filter_map(|doc| match Material::from_document(doc) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "skipping malformed material");
                None
            }
        })
        .collect()
}

async fn pump(
    publisher: Arc<Publisher>,
    mut live: LiveQuery,
    class: String,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let snapshot = tokio::select! {
            _ = cancel.cancelled() => break,
            s = live.next() => s,
        };
        match snapshot {
            Some(Ok(docs)) => {
                let materials = decode(&docs);
                debug!(class = %class, count = materials.len(), "feed updated");
                publisher.publish(FeedState {
                    class: Some(class.clone()),
                    status: FeedStatus::Ready,
                    materials: materials.into(),
                    generation,
                });
            }
            Some(Err(e)) => {
                error!(class = %class, error = %e, "subscription failed");
                publisher.publish(FeedState {
                    class: Some(class.clone()),
                    status: FeedStatus::Error(e.to_string()),
                    materials: Arc::from(Vec::new()),
                    generation,
                });
                break;
            }
            None => break,
        }
    }
    live.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use studyhub_docdb::{server_timestamp, MemoryDocs};

    fn record(class: &str, name: &str) -> serde_json::Value {
        json!({
            "fileName": name,
            "category": "Notes",
            "fileURL": format!("blob://t/materials/{}/{}", class, name),
            "class": class,
            "uploadedBy": "Asha",
            "uploaderUID": "u1",
            "uploadDate": server_timestamp(),
        })
    }

    async fn settled(repo: &MaterialRepository) -> FeedState {
        let mut rx = repo.watch();
        let state = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            rx.wait_for(|s| s.status.is_settled()),
        )
        .await
        .expect("feed did not settle")
        .expect("feed closed");
        state.clone()
    }

    fn names(state: &FeedState) -> Vec<&str> {
        state.materials.iter().map(|m| m.file_name.as_str()).collect()
    }

    #[tokio::test]
    async fn lists_class_newest_first() {
        let docs = Arc::new(MemoryDocs::new());
        docs.add("materials", record("A", "old.pdf")).await.unwrap();
        docs.add("materials", record("B", "other.pdf")).await.unwrap();
        docs.add("materials", record("A", "new.pdf")).await.unwrap();

        let store = Arc::new(StateStore::new());
        let repo = MaterialRepository::new(docs.clone(), "materials", store.clone());
        repo.switch_class(Some("A")).await;

        let state = settled(&repo).await;
        assert_eq!(state.status, FeedStatus::Ready);
        assert_eq!(names(&state), vec!["new.pdf", "old.pdf"]);
        assert_eq!(*store.read::<FeedState>().unwrap(), state);
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let docs = Arc::new(MemoryDocs::new());
        docs.add("materials", record("A", "good.pdf")).await.unwrap();
        docs.add(
            "materials",
            json!({"class": "A", "uploadDate": server_timestamp(), "fileName": 7}),
        )
        .await
        .unwrap();

        let repo = MaterialRepository::new(docs, "materials", Arc::new(StateStore::new()));
        repo.switch_class(Some("A")).await;
        let state = settled(&repo).await;
        assert_eq!(names(&state), vec!["good.pdf"]);
    }

    #[tokio::test]
    async fn no_class_means_idle() {
        let docs = Arc::new(MemoryDocs::new());
        let repo = MaterialRepository::new(docs, "materials", Arc::new(StateStore::new()));
        repo.switch_class(Some("A")).await;
        settled(&repo).await;

        repo.switch_class(None).await;
        let state = repo.snapshot();
        assert_eq!(state.status, FeedStatus::Idle);
        assert!(state.materials.is_empty());
        assert_eq!(state.class, None);
    }

    #[tokio::test]
    async fn switching_class_bumps_generation_and_drops_old_items() {
        let docs = Arc::new(MemoryDocs::new());
        docs.add("materials", record("A", "a.pdf")).await.unwrap();
        docs.add("materials", record("B", "b.pdf")).await.unwrap();
        let repo = MaterialRepository::new(docs.clone(), "materials", Arc::new(StateStore::new()));

        repo.switch_class(Some("A")).await;
        let a = settled(&repo).await;
        repo.switch_class(Some("B")).await;
        let b = settled(&repo).await;
        assert!(b.generation > a.generation);
        assert_eq!(names(&b), vec!["b.pdf"]);

        // Writes to the old class no longer reach the feed.
        docs.add("materials", record("A", "late.pdf")).await.unwrap();
        docs.add("materials", record("B", "b2.pdf")).await.unwrap();
        let mut rx = repo.watch();
        let state = rx
            .wait_for(|s| s.materials.len() == 2)
            .await
            .unwrap()
            .clone();
        assert!(state.materials.iter().all(|m| m.class == "B"));
    }

    #[tokio::test]
    async fn same_class_is_noop() {
        let docs = Arc::new(MemoryDocs::new());
        let repo = MaterialRepository::new(docs, "materials", Arc::new(StateStore::new()));
        repo.switch_class(Some("A")).await;
        let first = settled(&repo).await;
        repo.switch_class(Some(" A ")).await;
        assert_eq!(repo.snapshot().generation, first.generation);
    }
}
