//! Validated, cancellable uploads.
//!
//! An upload stores the bytes first, then writes one material record that
//! points at them. Validation runs before anything is sent.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use studyhub_auth::Identity;
use studyhub_blob::{BlobError, BlobStore, TransferProgress};
use studyhub_docdb::{server_timestamp, DocumentStore};

use crate::config::{mime_for_extension, HubConfig};
use crate::error::{UploadError, ValidationError};
use crate::model::{Category, Material};
use crate::session::Session;
use crate::state::{AuthState, StateStore, UploadPhase, UploadState};

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut file = Self::new(name, bytes);
        file.mime_type = file
            .extension()
            .and_then(|e| mime_for_extension(&e))
            .map(String::from);
        Ok(file)
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Lowercased extension, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<SelectedFile>,
    /// Name shown in the list. Defaults to the file name.
    pub display_name: Option<String>,
    pub category: Option<Category>,
}

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidUpload {
    pub identity: Identity,
    pub class: String,
    pub file: SelectedFile,
    pub display_name: String,
    pub category: Category,
    pub file_type: Option<String>,
}

/// Check an upload request against the session, in a fixed order: signed
/// in, file present, size, type, category, display name, class.
pub fn validate(
    config: &HubConfig,
    auth: &AuthState,
    request: UploadRequest,
) -> Result<ValidUpload, ValidationError> {
    let identity = match (&auth.identity, auth.is_authenticated()) {
        (Some(identity), true) => identity.clone(),
        _ => return Err(ValidationError::NotSignedIn),
    };

    let file = request.file.ok_or(ValidationError::NoFile)?;
    if file.size() > config.max_upload_bytes {
        return Err(ValidationError::TooLarge {
            size: file.size(),
            limit: config.max_upload_bytes,
        });
    }

    let ext = file.extension();
    let by_extension = ext.as_deref().is_some_and(|e| config.allows_extension(e));
    let by_mime = file
        .mime_type
        .as_deref()
        .is_some_and(|m| config.allows_mime(m));
    if !by_extension && !by_mime {
        let described = file
            .mime_type
            .clone()
            .or_else(|| ext.clone())
            .unwrap_or_else(|| file.name.clone());
        return Err(ValidationError::UnsupportedType(described));
    }

    let category = request.category.ok_or(ValidationError::NoCategory)?;

    let display_name = request
        .display_name
        .as_deref()
        .unwrap_or(&file.name)
        .trim()
        .to_string();
    if display_name.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let class = auth
        .class()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or(ValidationError::NoClass)?
        .to_string();

    let file_type = file
        .mime_type
        .clone()
        .or_else(|| ext.as_deref().and_then(mime_for_extension).map(String::from));

    Ok(ValidUpload {
        identity,
        class,
        file,
        display_name,
        category,
        file_type,
    })
}

fn sanitize(component: &str) -> String {
    let cleaned: String = component
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// `{prefix}/{class}/{unix_millis}_{file_name}`, with path separators in
/// the class and file name replaced.
pub fn storage_key(prefix: &str, class: &str, unix_millis: i64, file_name: &str) -> String {
    format!(
        "{}/{}/{}_{}",
        prefix,
        sanitize(class),
        unix_millis,
        sanitize(file_name)
    )
}

/// A running upload.
pub struct UploadHandle {
    id: u64,
    progress: watch::Receiver<u8>,
    cancel: CancellationToken,
    task: JoinHandle<Result<Material, UploadError>>,
}

impl UploadHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whole percent, never decreasing.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    pub fn percent(&self) -> u8 {
        *self.progress.borrow()
    }

    /// Ask the upload to stop. Takes effect between chunks; a blob that
    /// already landed is removed and no record is written.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this upload, for use from another task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> Result<Material, UploadError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(UploadError::Cancelled),
            Err(e) => Err(UploadError::Internal(e.to_string())),
        }
    }
}

pub struct UploadCoordinator {
    session: Arc<Session>,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<HubConfig>,
    store: Arc<StateStore>,
    latest: Arc<AtomicU64>,
}

impl UploadCoordinator {
    pub fn new(
        session: Arc<Session>,
        docs: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        config: Arc<HubConfig>,
        store: Arc<StateStore>,
    ) -> Self {
        store.put(UploadState {
            upload: 0,
            file_name: String::new(),
            phase: UploadPhase::Idle,
            percent: 0,
        });
        Self {
            session,
            docs,
            blobs,
            config,
            store,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Validate and start an upload. Validation errors are returned before
    /// any collaborator is called.
    pub fn start(&self, request: UploadRequest) -> Result<UploadHandle, ValidationError> {
        let valid = validate(&self.config, &self.session.state(), request)?;

        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let (progress, progress_rx) = watch::channel(0u8);
        let cancel = CancellationToken::new();
        let job = UploadJob {
            id,
            docs: self.docs.clone(),
            blobs: self.blobs.clone(),
            config: self.config.clone(),
            store: self.store.clone(),
            latest: self.latest.clone(),
            progress,
            cancel: cancel.clone(),
            upload: valid,
        };
        job.publish(UploadPhase::Transferring);
        info!(
            upload = id,
            file = %job.upload.file.name,
            size = job.upload.file.size(),
            class = %job.upload.class,
            "upload started"
        );
        let task = tokio::spawn(job.run());
        Ok(UploadHandle {
            id,
            progress: progress_rx,
            cancel,
            task,
        })
    }
}

struct UploadJob {
    id: u64,
    docs: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<HubConfig>,
    store: Arc<StateStore>,
    latest: Arc<AtomicU64>,
    progress: watch::Sender<u8>,
    cancel: CancellationToken,
    upload: ValidUpload,
}

impl UploadJob {
    async fn run(self) -> Result<Material, UploadError> {
        let result = self.transfer_and_record().await;
        match &result {
            Ok(material) => {
                info!(upload = self.id, id = %material.id, "upload finished");
                self.publish(UploadPhase::Done {
                    material_id: material.id.clone(),
                });
            }
            Err(UploadError::Cancelled) => {
                info!(upload = self.id, "upload cancelled");
                self.publish(UploadPhase::Cancelled);
            }
            Err(e) => {
                warn!(upload = self.id, error = %e, "upload failed");
                self.publish(UploadPhase::Failed(e.user_message()));
            }
        }
        result
    }

    async fn transfer_and_record(&self) -> Result<Material, UploadError> {
        let up = &self.upload;
        let key = storage_key(
            &self.config.storage_prefix,
            &up.class,
            chrono::Utc::now().timestamp_millis(),
            &up.file.name,
        );

        let chunked = self.blobs.reports_progress();
        let on_progress = |p: TransferProgress| {
            if chunked {
                self.advance(p.percent());
            }
        };
        let meta = match self
            .blobs
            .put(&key, &up.file.bytes, &on_progress, &self.cancel)
            .await
        {
            Ok(meta) => meta,
            Err(BlobError::Cancelled) => return Err(UploadError::Cancelled),
            Err(e) => return Err(UploadError::Transfer(e)),
        };
        self.advance(100);

        if self.cancel.is_cancelled() {
            // The bytes landed after the caller gave up: no record.
            if let Err(e) = self.blobs.delete(&key).await {
                warn!(key = %key, error = %e, "could not remove blob of cancelled upload");
            }
            return Err(UploadError::Cancelled);
        }

        self.publish(UploadPhase::Saving);
        let record = json!({
            "fileName": up.display_name,
            "category": up.category.label(),
            "fileURL": meta.url,
            "class": up.class,
            "uploadedBy": up.identity.display_name,
            "uploaderUID": up.identity.id,
            "uploadDate": server_timestamp(),
            "fileSize": up.file.size(),
            "fileType": up.file_type,
        });
        let doc = match self
            .docs
            .add(&self.config.materials_collection, record)
            .await
        {
            Ok(doc) => doc,
            Err(e) => {
                error!(key = %key, error = %e, "material record not saved, blob orphaned");
                return Err(UploadError::Record {
                    source: e,
                    orphaned_key: key,
                });
            }
        };
        Material::from_document(&doc).map_err(|e| UploadError::Internal(e.to_string()))
    }

    /// Raise the progress to `percent`; lower values are ignored.
    fn advance(&self, percent: u8) {
        let raised = self.progress.send_if_modified(|p| {
            if percent > *p {
                *p = percent;
                true
            } else {
                false
            }
        });
        if raised {
            self.publish(UploadPhase::Transferring);
        }
    }

    /// Publish this upload's state unless a newer upload has started.
    fn publish(&self, phase: UploadPhase) {
        if self.latest.load(Ordering::SeqCst) != self.id {
            debug!(upload = self.id, "superseded upload state dropped");
            return;
        }
        self.store.put(UploadState {
            upload: self.id,
            file_name: self.upload.display_name.clone(),
            phase,
            percent: *self.progress.borrow(),
        });
    }
}
