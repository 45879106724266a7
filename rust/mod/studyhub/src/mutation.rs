//! Owner-only changes to materials.
//!
//! Ownership is checked against the live session on every call. A delete
//! removes the record first and the blob second; when the second step fails
//! the error says so, and nothing is rolled back.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{info, warn};

use studyhub_auth::Identity;
use studyhub_blob::BlobStore;
use studyhub_docdb::{DocError, DocumentStore};

use crate::error::MutationError;
use crate::model::{Category, Material};
use crate::session::Session;
use crate::state::{MutationState, StateStore};

/// Whether `identity` uploaded `material`.
pub fn is_owner(material: &Material, identity: Option<&Identity>) -> bool {
    identity.is_some_and(|i| !i.id.is_empty() && i.id == material.uploader_id)
}

pub struct MutationController {
    session: Arc<Session>,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    collection: String,
    store: Arc<StateStore>,
    state: Mutex<MutationState>,
}

/// Marks a material as busy until dropped.
struct Pending<'a> {
    controller: &'a MutationController,
    id: String,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        self.controller
            .modify(|s| {
                s.pending.remove(&self.id);
            });
    }
}

impl MutationController {
    pub fn new(
        session: Arc<Session>,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        collection: &str,
        store: Arc<StateStore>,
    ) -> Self {
        store.put(MutationState::default());
        Self {
            session,
            docs,
            blobs,
            collection: collection.to_string(),
            store,
            state: Mutex::new(MutationState::default()),
        }
    }

    /// Whether the signed-in user may change `material`.
    pub fn can_modify(&self, material: &Material) -> bool {
        is_owner(material, self.session.identity().as_ref())
    }

    /// Delete the record, then its blob.
    pub async fn delete(&self, material: &Material) -> Result<(), MutationError> {
        self.authorize(material)?;
        let _pending = self.begin(&material.id);

        let result = self.remove(material).await;
        self.finish(&result);
        result
    }

    /// Change only the category of `material`.
    pub async fn edit_category(
        &self,
        material: &Material,
        category: Category,
    ) -> Result<Material, MutationError> {
        self.authorize(material)?;
        let _pending = self.begin(&material.id);

        let result = self
            .docs
            .update(
                &self.collection,
                &material.id,
                json!({ "category": category.label() }),
            )
            .await
            .map_err(|e| match e {
                DocError::NotFound(_) => MutationError::NotFound(material.id.clone()),
                other => MutationError::Metadata(other),
            })
            .and_then(|doc| Material::from_document(&doc).map_err(MutationError::Metadata));

        if result.is_ok() {
            info!(id = %material.id, category = %category, "category changed");
        }
        self.finish(&result);
        result
    }

    fn authorize(&self, material: &Material) -> Result<(), MutationError> {
        let identity = self.session.identity().ok_or(MutationError::NotSignedIn)?;
        if !is_owner(material, Some(&identity)) {
            warn!(id = %material.id, uid = %identity.id, "change rejected, not the uploader");
            return Err(MutationError::NotOwner);
        }
        Ok(())
    }

    async fn remove(&self, material: &Material) -> Result<(), MutationError> {
        self.docs
            .delete(&self.collection, &material.id)
            .await
            .map_err(MutationError::Metadata)?;
        info!(id = %material.id, "material record deleted");

        if material.file_url.is_empty() {
            return Ok(());
        }
        let Some(key) = self.blobs.key_from_url(&material.file_url) else {
            warn!(id = %material.id, url = %material.file_url, "blob left behind, unknown location");
            return Err(MutationError::UnknownLocation {
                url: material.file_url.clone(),
                metadata_deleted: true,
            });
        };
        match self.blobs.delete(&key).await {
            Ok(()) => {
                info!(id = %material.id, key = %key, "material blob deleted");
                Ok(())
            }
            Err(source) => {
                warn!(id = %material.id, key = %key, error = %source, "blob left behind");
                Err(MutationError::Blob {
                    source,
                    metadata_deleted: true,
                })
            }
        }
    }

    fn begin(&self, id: &str) -> Pending<'_> {
        self.modify(|s| {
            s.pending.insert(id.to_string());
            s.last_error = None;
        });
        Pending {
            controller: self,
            id: id.to_string(),
        }
    }

    fn finish<T>(&self, result: &Result<T, MutationError>) {
        if let Err(e) = result {
            let message = e.user_message();
            self.modify(|s| s.last_error = Some(message));
        }
    }

    fn modify(&self, update: impl FnOnce(&mut MutationState)) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut state);
        self.store.put(state.clone());
    }
}
