use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    #[error("unrecognized blob url: {0}")]
    InvalidUrl(String),

    #[error("transfer cancelled")]
    Cancelled,
}
