//! Standing queries.
//!
//! A `LiveQuery` delivers the full result set of a query once on start and
//! again after every committed write that changes it. Delivery stops on the
//! first error, on `close()`, or when the handle is dropped.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::changes::ChangeEvent;
use crate::document::Document;
use crate::error::DocError;
use crate::query::Query;
use crate::traits::DocumentStore;

/// One delivery: the current result set, or the error that ended the query.
pub type Snapshot = Result<Vec<Document>, DocError>;

/// Snapshots buffered before the producer waits on the consumer.
const SNAPSHOT_BUFFER: usize = 16;

pub struct LiveQuery {
    query: Query,
    rx: mpsc::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl LiveQuery {
    /// Start a standing query. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn DocumentStore>, query: Query) -> Self {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        // Subscribe before the first read so no write slips in between.
        let changes = store.changes();
        let task = tokio::spawn(run(store, query.clone(), changes, tx));
        Self {
            query,
            rx,
            task: Some(task),
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Wait for the next snapshot. Returns None once the query has ended
    /// and every buffered snapshot has been taken.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    /// Stop delivery and wait for the producer to exit. No snapshot is
    /// delivered after this returns.
    pub async fn close(mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    store: Arc<dyn DocumentStore>,
    query: Query,
    mut changes: broadcast::Receiver<ChangeEvent>,
    tx: mpsc::Sender<Snapshot>,
) {
    let mut last: Option<Vec<Document>> = None;
    loop {
        match store.query(&query).await {
            Ok(docs) => {
                if last.as_ref() != Some(&docs) {
                    if tx.send(Ok(docs.clone())).await.is_err() {
                        return;
                    }
                    last = Some(docs);
                }
            }
            Err(e) => {
                tracing::warn!(collection = query.collection_name(), error = %e, "live query failed");
                let _ = tx.send(Err(e)).await;
                return;
            }
        }

        // Wait for a write that could affect this collection.
        loop {
            match changes.recv().await {
                Ok(ev) if ev.collection == query.collection_name() => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "live query lagged, re-reading");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    let _ = tx
                        .send(Err(DocError::Unavailable("change feed closed".into())))
                        .await;
                    return;
                }
            }
        }
    }
}
