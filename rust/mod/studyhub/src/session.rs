//! The signed-in user: identity, profile and the session phase.
//!
//! `Session` is the only writer of the auth state. It follows the auth
//! provider's identity stream, resolves the profile for every new identity
//! before announcing it, and exposes sign-in, sign-out and class selection.

use std::sync::{Arc, Mutex, Weak};

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use studyhub_auth::{AuthError, AuthProvider, Credentials, Identity, Registration};
use studyhub_docdb::{server_timestamp, DocumentStore};

use crate::config::HubConfig;
use crate::error::SessionError;
use crate::model::Profile;
use crate::state::{AuthState, SessionPhase};

/// Outcome of a class change.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassUpdate {
    Persisted,
    /// The profile store rejected the write; only this session sees the
    /// new class.
    LocalOnly { reason: String },
}

pub struct Session {
    auth: Arc<dyn AuthProvider>,
    docs: Arc<dyn DocumentStore>,
    config: Arc<HubConfig>,
    state: watch::Sender<AuthState>,
    /// Serializes identity application so profile resolution for two
    /// identities never interleaves.
    apply_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

/// Clears the busy flag on every exit path, including a dropped future.
struct BusyGuard<'a>(&'a watch::Sender<AuthState>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0
            .send_if_modified(|s| std::mem::replace(&mut s.busy, false));
    }
}

impl Session {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        docs: Arc<dyn DocumentStore>,
        config: Arc<HubConfig>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(AuthState::default());
        Arc::new(Self {
            auth,
            docs,
            config,
            state,
            apply_lock: tokio::sync::Mutex::new(()),
            listener: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Resolve the initial identity, then follow the provider's identity
    /// stream until `shutdown`. Returns once the session has left `Loading`.
    pub async fn start(self: &Arc<Self>) {
        if !self.transition(SessionPhase::Loading, |_| {}) {
            return;
        }

        let mut identities = self.auth.watch();
        let initial = identities.borrow_and_update().clone();
        self.apply_identity(initial).await;

        let session: Weak<Session> = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = identities.changed() => {
                        if changed.is_err() {
                            debug!("identity stream closed");
                            break;
                        }
                        let identity = identities.borrow_and_update().clone();
                        let Some(session) = session.upgrade() else { break };
                        session.apply_identity(identity).await;
                    }
                }
            }
        });
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
    }

    /// Stop following the identity stream.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let task = self.listener.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// The current identity, only once its profile is resolved.
    pub fn identity(&self) -> Option<Identity> {
        let state = self.state.borrow();
        if state.is_authenticated() {
            state.identity.clone()
        } else {
            None
        }
    }

    pub fn class(&self) -> Option<String> {
        self.state.borrow().class().map(str::to_string)
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        let _busy = self.begin();
        let result = self.auth.sign_in(credentials).await;
        self.finish(result).await
    }

    pub async fn register(&self, registration: Registration) -> Result<Identity, SessionError> {
        let _busy = self.begin();
        let result = self.auth.register(registration).await;
        self.finish(result).await
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let _busy = self.begin();
        if let Err(e) = self.auth.sign_out().await {
            self.record_error(&e);
            return Err(e.into());
        }
        self.apply_identity(None).await;
        Ok(())
    }

    /// Select the class whose materials the user sees.
    pub async fn set_class(&self, class: &str) -> Result<ClassUpdate, SessionError> {
        let class = class.trim();
        if class.is_empty() {
            return Err(SessionError::EmptyClass);
        }
        let identity = self.identity().ok_or(SessionError::NotSignedIn)?;

        let write = self
            .docs
            .update(
                &self.config.profiles_collection,
                &identity.id,
                json!({ "class": class }),
            )
            .await;

        let updated = self.update_profile(&identity.id, |p| p.class = Some(class.to_string()));
        if !updated {
            // Signed out or switched accounts while the write was in flight.
            return Err(SessionError::NotSignedIn);
        }

        match write {
            Ok(_) => {
                info!(uid = %identity.id, class, "class updated");
                Ok(ClassUpdate::Persisted)
            }
            Err(e) => {
                warn!(uid = %identity.id, class, error = %e, "class kept locally, profile write failed");
                Ok(ClassUpdate::LocalOnly {
                    reason: e.to_string(),
                })
            }
        }
    }

    fn begin(&self) -> BusyGuard<'_> {
        self.state.send_modify(|s| {
            s.busy = true;
            s.error = None;
        });
        BusyGuard(&self.state)
    }

    async fn finish(&self, result: Result<Identity, AuthError>) -> Result<Identity, SessionError> {
        match result {
            Ok(identity) => {
                if !self.apply_identity(Some(identity.clone())).await {
                    self.state
                        .send_modify(|s| s.error = Some(SessionError::NotStarted.user_message()));
                    return Err(SessionError::NotStarted);
                }
                Ok(identity)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e.into())
            }
        }
    }

    fn record_error(&self, e: &AuthError) {
        debug!(error = %e, "auth operation failed");
        let message = match e {
            AuthError::Cancelled => None,
            other => Some(other.user_message()),
        };
        self.state.send_modify(|s| s.error = message);
    }

    /// Move to `to` if legal, applying `update` in the same step.
    fn transition(&self, to: SessionPhase, update: impl FnOnce(&mut AuthState)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|s| {
            if !s.phase.can_transition(to) {
                warn!(from = ?s.phase, to = ?to, "rejected session transition");
                return false;
            }
            if s.phase != to {
                info!(from = ?s.phase, to = ?to, "session transition");
            }
            s.phase = to;
            update(s);
            applied = true;
            true
        });
        applied
    }

    /// Same-phase profile update for the authenticated `uid`.
    fn update_profile(&self, uid: &str, update: impl FnOnce(&mut Profile)) -> bool {
        self.state.send_if_modified(|s| {
            if !s.is_authenticated() {
                return false;
            }
            match s.profile.as_mut() {
                Some(profile) if profile.uid == uid => {
                    update(profile);
                    true
                }
                _ => false,
            }
        })
    }

    /// Returns false when the session is not in a phase that accepts the
    /// identity, i.e. `start` has not run yet.
    async fn apply_identity(&self, identity: Option<Identity>) -> bool {
        let _guard = self.apply_lock.lock().await;
        let current = self.state();

        match identity {
            None => {
                if current.phase == SessionPhase::Anonymous {
                    return true;
                }
                self.transition(SessionPhase::Anonymous, |s| {
                    s.identity = None;
                    s.profile = None;
                })
            }
            Some(identity) => {
                let same = current.is_authenticated()
                    && current.identity.as_ref().map(|i| &i.id) == Some(&identity.id);
                if same {
                    return true;
                }
                if !current.phase.can_transition(SessionPhase::Authenticated)
                    && !current.is_authenticated()
                {
                    warn!(phase = ?current.phase, "identity arrived before the session started");
                    return false;
                }
                if current.is_authenticated() {
                    // Account switch: drop the old account before resolving
                    // the new one.
                    self.transition(SessionPhase::Anonymous, |s| {
                        s.identity = None;
                        s.profile = None;
                    });
                }
                let profile = self.resolve_profile(&identity).await;
                self.transition(SessionPhase::Authenticated, |s| {
                    s.identity = Some(identity);
                    s.profile = Some(profile);
                })
            }
        }
    }

    /// Fetch or create the profile. Never fails: on any error the session
    /// continues with a degraded in-memory profile.
    async fn resolve_profile(&self, identity: &Identity) -> Profile {
        match self.upsert_profile(identity).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(uid = %identity.id, error = %e, "profile unavailable, using local fallback");
                Profile::fallback(identity)
            }
        }
    }

    async fn upsert_profile(&self, identity: &Identity) -> Result<Profile, SessionError> {
        // A fresh token first, so the profile write is accepted.
        self.auth.id_token(true).await?;

        let collection = &self.config.profiles_collection;
        let doc = match self.docs.get(collection, &identity.id).await? {
            None => {
                let doc = self
                    .docs
                    .merge(
                        collection,
                        &identity.id,
                        json!({
                            "uid": identity.id,
                            "name": identity.display_name,
                            "email": identity.email,
                            "photoURL": identity.avatar_url,
                            "class": null,
                            "createdAt": server_timestamp(),
                            "lastLogin": server_timestamp(),
                        }),
                    )
                    .await?;
                info!(uid = %identity.id, "profile created");
                doc
            }
            Some(_) => {
                self.docs
                    .merge(collection, &identity.id, json!({ "lastLogin": server_timestamp() }))
                    .await?
            }
        };
        Ok(Profile::from_document(&doc)?)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
