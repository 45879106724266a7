use studyhub_auth::AuthError;
use studyhub_blob::BlobError;
use studyhub_docdb::DocError;
use thiserror::Error;

const TRY_AGAIN: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("not signed in")]
    NotSignedIn,

    #[error("session has not been started")]
    NotStarted,

    #[error("class must not be empty")]
    EmptyClass,

    #[error("profile store: {0}")]
    Profile(#[from] DocError),
}

impl SessionError {
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Auth(e) => e.user_message(),
            SessionError::NotSignedIn => "Please sign in first.".into(),
            SessionError::NotStarted => TRY_AGAIN.into(),
            SessionError::EmptyClass => "Please choose a class.".into(),
            SessionError::Profile(_) => TRY_AGAIN.into(),
        }
    }
}

/// Upload input rejected before anything was sent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("no file selected")]
    NoFile,

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("no category selected")]
    NoCategory,

    #[error("file name must not be empty")]
    EmptyName,

    #[error("no class selected")]
    NoClass,
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ValidationError::NotSignedIn => "Please sign in to upload files.".into(),
            ValidationError::NoFile => "Please select a file.".into(),
            ValidationError::TooLarge { limit, .. } => {
                format!("File size must be less than {}MB.", limit / (1024 * 1024))
            }
            ValidationError::UnsupportedType(_) => {
                "Only PDF, Word documents and images (JPG, PNG, GIF) are allowed.".into()
            }
            ValidationError::NoCategory => "Please select a category.".into(),
            ValidationError::EmptyName => "Please enter a file name.".into(),
            ValidationError::NoClass => "Please select your class in your profile first.".into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transfer failed: {0}")]
    Transfer(BlobError),

    /// The blob landed but its record was not written; the blob is left
    /// behind under `orphaned_key`.
    #[error("record not saved, blob {orphaned_key} orphaned: {source}")]
    Record { source: DocError, orphaned_key: String },

    #[error("upload cancelled")]
    Cancelled,

    #[error("upload task failed: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Validation(e) => e.user_message(),
            UploadError::Cancelled => "Upload cancelled.".into(),
            UploadError::Transfer(_) | UploadError::Record { .. } | UploadError::Internal(_) => {
                "Failed to upload file. Please try again.".into()
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MutationError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("only the uploader can change this material")]
    NotOwner,

    #[error("material not found: {0}")]
    NotFound(String),

    #[error("metadata: {0}")]
    Metadata(DocError),

    /// Blob removal failed. With `metadata_deleted` the record is already
    /// gone and the blob is left behind.
    #[error("blob: {source} (metadata deleted: {metadata_deleted})")]
    Blob {
        source: BlobError,
        metadata_deleted: bool,
    },

    #[error("file location not recognized: {url} (metadata deleted: {metadata_deleted})")]
    UnknownLocation { url: String, metadata_deleted: bool },
}

impl MutationError {
    pub fn user_message(&self) -> String {
        match self {
            MutationError::NotSignedIn => "Please sign in first.".into(),
            MutationError::NotOwner => "You can only change files you uploaded.".into(),
            MutationError::NotFound(_) => "This file no longer exists.".into(),
            MutationError::Metadata(_) => "Failed to delete file. Please try again.".into(),
            MutationError::Blob { .. } | MutationError::UnknownLocation { .. } => {
                "The file entry was removed but its data could not be deleted.".into()
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DownloadError {
    #[error("file location not recognized: {0}")]
    UnknownLocation(String),

    #[error("file data missing: {0}")]
    Missing(String),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl DownloadError {
    pub fn user_message(&self) -> String {
        match self {
            DownloadError::Missing(_) => "This file is no longer available.".into(),
            DownloadError::UnknownLocation(_) | DownloadError::Blob(_) => TRY_AGAIN.into(),
        }
    }
}
