//! Blob keys and the URLs that point at them.

use crate::error::BlobError;

const URL_SCHEME: &str = "blob://";

/// Check that a key is a relative path with no empty, `.` or `..` segments.
pub fn validate(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || key.starts_with('/') || key.starts_with('\\') || key.contains('\\') {
        return Err(BlobError::InvalidKey(format!("{:?}", key)));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(BlobError::InvalidKey(format!("{:?}", key)));
        }
    }
    Ok(())
}

/// `blob://{bucket}/{key}`
pub fn to_url(bucket: &str, key: &str) -> String {
    format!("{}{}/{}", URL_SCHEME, bucket, key)
}

/// Inverse of `to_url` for one bucket. URLs of other buckets, or carrying
/// an invalid key, resolve to None.
pub fn from_url(bucket: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(URL_SCHEME)?;
    let key = rest.strip_prefix(bucket)?.strip_prefix('/')?;
    validate(key).ok()?;
    Some(key.to_string())
}
