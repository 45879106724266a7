//! The client facade.
//!
//! `StudyHub` wires the session, the material feed, the displayed view,
//! uploads and mutations together, and keeps the feed pointed at the
//! signed-in user's class. A front-end talks to this type and reads the
//! state store.

use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use studyhub_auth::{AuthProvider, Credentials, Identity, Registration};
use studyhub_blob::BlobStore;
use studyhub_docdb::DocumentStore;

use crate::config::HubConfig;
use crate::error::{DownloadError, MutationError, SessionError, ValidationError};
use crate::filter::CategoryFilter;
use crate::model::{Category, Material};
use crate::mutation::MutationController;
use crate::repository::MaterialRepository;
use crate::session::{ClassUpdate, Session};
use crate::state::{AuthState, FeedState, FilterState, MaterialView, StateStore, UploadState};
use crate::upload::{UploadCoordinator, UploadHandle, UploadRequest};
use crate::view::ViewModel;

pub struct StudyHub {
    config: Arc<HubConfig>,
    auth: Arc<dyn AuthProvider>,
    blobs: Arc<dyn BlobStore>,
    store: Arc<StateStore>,
    session: Arc<Session>,
    repository: MaterialRepository,
    view: Arc<ViewModel>,
    uploads: UploadCoordinator,
    mutations: MutationController,
    /// Serializes feed re-targeting so two syncs never race.
    sync_lock: tokio::sync::Mutex<()>,
    driver: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl StudyHub {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: HubConfig,
    ) -> Arc<Self> {
        let config = Arc::new(config);
        let store = Arc::new(StateStore::new());
        store.put(AuthState::default());

        let session = Session::new(auth.clone(), docs.clone(), config.clone());
        let repository =
            MaterialRepository::new(docs.clone(), &config.materials_collection, store.clone());
        let view = ViewModel::attach(store.clone());
        let uploads = UploadCoordinator::new(
            session.clone(),
            docs.clone(),
            blobs.clone(),
            config.clone(),
            store.clone(),
        );
        let mutations = MutationController::new(
            session.clone(),
            docs,
            blobs.clone(),
            &config.materials_collection,
            store.clone(),
        );

        Arc::new(Self {
            config,
            auth,
            blobs,
            store,
            session,
            repository,
            view,
            uploads,
            mutations,
            sync_lock: tokio::sync::Mutex::new(()),
            driver: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Resolve the initial session and follow it until `shutdown`.
    pub async fn start(self: &Arc<Self>) {
        self.session.start().await;
        self.sync().await;

        let mut states = self.session.watch();
        let hub: Weak<StudyHub> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        states.borrow_and_update();
                        let Some(hub) = hub.upgrade() else { break };
                        hub.sync().await;
                    }
                }
            }
            debug!("session driver stopped");
        });
        *self.driver.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
        info!("studyhub started");
    }

    /// Stop following the session and release the subscription.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.driver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.session.shutdown().await;
        self.repository.shutdown().await;
        info!("studyhub stopped");
    }

    /// Mirror the session into the state store and point the feed at the
    /// signed-in user's class, or at nothing.
    async fn sync(&self) {
        let _guard = self.sync_lock.lock().await;
        let state = self.session.state();
        let class = state.class().map(str::to_string);
        self.store.put(state);
        self.repository.switch_class(class.as_deref()).await;
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn class_catalog(&self) -> &[String] {
        &self.config.class_catalog
    }

    pub fn auth_state(&self) -> AuthState {
        self.session.state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        let result = self.session.sign_in(credentials).await;
        self.sync().await;
        result
    }

    pub async fn register(&self, registration: Registration) -> Result<Identity, SessionError> {
        let result = self.session.register(registration).await;
        self.sync().await;
        result
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let result = self.session.sign_out().await;
        self.sync().await;
        result
    }

    pub async fn set_class(&self, class: &str) -> Result<ClassUpdate, SessionError> {
        let result = self.session.set_class(class).await;
        self.sync().await;
        result
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), SessionError> {
        Ok(self.auth.send_password_reset(email).await?)
    }

    pub async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), SessionError> {
        Ok(self.auth.confirm_password_reset(code, new_password).await?)
    }

    pub fn feed(&self) -> FeedState {
        self.repository.snapshot()
    }

    /// Re-issue a failed subscription.
    pub async fn retry_feed(&self) {
        self.repository.retry().await;
    }

    /// Wait until the feed satisfies `ready`, returning that state.
    pub async fn wait_feed(&self, mut ready: impl FnMut(&FeedState) -> bool) -> FeedState {
        let mut feed = self.repository.watch();
        loop {
            {
                let state = feed.borrow_and_update();
                if ready(&state) {
                    return state.clone();
                }
            }
            if feed.changed().await.is_err() {
                return self.repository.snapshot();
            }
        }
    }

    /// Wait until the feed is idle, ready or failed.
    pub async fn wait_feed_settled(&self) -> FeedState {
        self.wait_feed(|s| s.status.is_settled()).await
    }

    pub fn filter(&self) -> FilterState {
        self.view.filter()
    }

    pub fn set_category(&self, category: CategoryFilter) {
        self.view.set_category(category);
    }

    pub fn set_query(&self, query: &str) {
        self.view.set_query(query);
    }

    pub fn view(&self) -> Arc<MaterialView> {
        self.view.current()
    }

    /// A material of the active class by id.
    pub fn find_material(&self, id: &str) -> Option<Material> {
        self.repository.snapshot().find(id).cloned()
    }

    pub fn upload(&self, request: UploadRequest) -> Result<UploadHandle, ValidationError> {
        self.uploads.start(request)
    }

    pub fn upload_state(&self) -> Option<Arc<UploadState>> {
        self.store.read::<UploadState>()
    }

    pub fn can_modify(&self, material: &Material) -> bool {
        self.mutations.can_modify(material)
    }

    pub async fn delete(&self, material: &Material) -> Result<(), MutationError> {
        self.mutations.delete(material).await
    }

    pub async fn edit_category(
        &self,
        material: &Material,
        category: Category,
    ) -> Result<Material, MutationError> {
        self.mutations.edit_category(material, category).await
    }

    /// Fetch the bytes behind a material's URL.
    pub async fn download(&self, material: &Material) -> Result<Vec<u8>, DownloadError> {
        let key = self
            .blobs
            .key_from_url(&material.file_url)
            .ok_or_else(|| DownloadError::UnknownLocation(material.file_url.clone()))?;
        self.blobs
            .get(&key)
            .await?
            .ok_or(DownloadError::Missing(key))
    }
}

impl Drop for StudyHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
