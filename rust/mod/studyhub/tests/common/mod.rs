#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use studyhub::{HubConfig, StudyHub};
use studyhub_auth::{AuthError, AuthProvider, Credentials, GoogleAccount, Identity, Registration};
use studyhub_blob::{BlobError, BlobMeta, BlobStore, MemoryStore, TransferProgress};
use studyhub_docdb::{
    server_timestamp, ChangeEvent, DocError, Document, DocumentStore, MemoryDocs, Query,
};

/// Auth provider that accepts any credentials.
pub struct FakeAuth {
    current: watch::Sender<Option<Identity>>,
    pub reject: AtomicBool,
}

impl FakeAuth {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            reject: AtomicBool::new(false),
        }
    }

    fn accept(&self, identity: Identity) -> Result<Identity, AuthError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(AuthError::InvalidCredentials);
        }
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, AuthError> {
        let identity = match credentials {
            Credentials::Google(account) => Identity {
                id: account.subject,
                display_name: account.display_name,
                email: account.email,
                avatar_url: account.avatar_url,
                email_verified: true,
            },
            Credentials::EmailPassword { email, .. } => Identity {
                id: email.clone(),
                display_name: email.split('@').next().unwrap_or_default().to_string(),
                email,
                avatar_url: None,
                email_verified: false,
            },
        };
        self.accept(identity)
    }

    async fn register(&self, registration: Registration) -> Result<Identity, AuthError> {
        self.accept(Identity {
            id: registration.email.clone(),
            display_name: registration.display_name,
            email: registration.email,
            avatar_url: None,
            email_verified: false,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.current.send_replace(None);
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn id_token(&self, _force_refresh: bool) -> Result<String, AuthError> {
        match self.current() {
            Some(identity) => Ok(format!("token-{}", identity.id)),
            None => Err(AuthError::NotSignedIn),
        }
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), AuthError> {
        Ok(())
    }

    async fn confirm_password_reset(&self, _code: &str, _new_password: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Document store that counts calls and fails on demand.
pub struct CountingDocs {
    pub inner: MemoryDocs,
    pub calls: AtomicUsize,
    pub fail_writes: AtomicBool,
    pub fail_queries: AtomicBool,
}

impl CountingDocs {
    pub fn new() -> Self {
        Self {
            inner: MemoryDocs::new(),
            calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_queries: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn write(&self) -> Result<(), DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DocError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for CountingDocs {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError> {
        self.write()?;
        self.inner.set(collection, id, data).await
    }

    async fn merge(&self, collection: &str, id: &str, data: Value) -> Result<Document, DocError> {
        self.write()?;
        self.inner.merge(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> Result<Document, DocError> {
        self.write()?;
        self.inner.update(collection, id, fields).await
    }

    async fn add(&self, collection: &str, data: Value) -> Result<Document, DocError> {
        self.write()?;
        self.inner.add(collection, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), DocError> {
        self.write()?;
        self.inner.delete(collection, id).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(DocError::PermissionDenied("queries disabled".into()));
        }
        self.inner.query(query).await
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.changes()
    }
}

/// Blob store that counts calls and can fail deletes.
pub struct CountingBlobs {
    pub inner: Arc<dyn BlobStore>,
    pub calls: AtomicUsize,
    pub fail_deletes: AtomicBool,
}

impl CountingBlobs {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for CountingBlobs {
    fn reports_progress(&self) -> bool {
        self.inner.reports_progress()
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        progress: &(dyn Fn(TransferProgress) + Send + Sync),
        cancel: &CancellationToken,
    ) -> Result<BlobMeta, BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, data, progress, cancel).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Io("deletes disabled".into()));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(key).await
    }

    fn url(&self, key: &str) -> String {
        self.inner.url(key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        self.inner.key_from_url(url)
    }
}

pub struct Harness {
    pub hub: Arc<StudyHub>,
    pub auth: Arc<FakeAuth>,
    pub docs: Arc<CountingDocs>,
    pub blobs: Arc<CountingBlobs>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::with_blobs(Arc::new(MemoryStore::new("studyhub"))).await
    }

    pub async fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        let auth = Arc::new(FakeAuth::new());
        let docs = Arc::new(CountingDocs::new());
        let blobs = Arc::new(CountingBlobs::new(blobs));
        let hub = StudyHub::new(auth.clone(), docs.clone(), blobs.clone(), HubConfig::default());
        hub.start().await;
        Self {
            hub,
            auth,
            docs,
            blobs,
        }
    }

    pub async fn sign_in(&self, uid: &str, name: &str) -> Identity {
        self.hub
            .sign_in(Credentials::Google(GoogleAccount {
                subject: uid.to_string(),
                display_name: name.to_string(),
                email: format!("{uid}@example.com"),
                avatar_url: None,
            }))
            .await
            .unwrap()
    }

    /// Sign in and select a class, waiting for the feed to settle.
    pub async fn join(&self, uid: &str, name: &str, class: &str) -> Identity {
        let identity = self.sign_in(uid, name).await;
        self.hub.set_class(class).await.unwrap();
        self.hub.wait_feed_settled().await;
        identity
    }

    pub fn reset_calls(&self) {
        self.docs.calls.store(0, Ordering::SeqCst);
        self.blobs.calls.store(0, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.docs.calls() + self.blobs.calls()
    }
}

/// Write a material record straight to the store.
pub async fn seed(docs: &dyn DocumentStore, class: &str, name: &str, category: &str, uid: &str) -> Document {
    docs.add(
        "materials",
        json!({
            "fileName": name,
            "category": category,
            "fileURL": format!("blob://studyhub/materials/{class}/{name}"),
            "class": class,
            "uploadedBy": uid,
            "uploaderUID": uid,
            "uploadDate": server_timestamp(),
        }),
    )
    .await
    .unwrap()
}
