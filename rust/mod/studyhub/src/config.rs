use serde::{Deserialize, Serialize};

/// Upload size limit: 10 MiB, inclusive.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Client core configuration. Every field has a default, so a partial
/// config file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Collection holding one profile per identity (`users/{uid}`).
    pub profiles_collection: String,
    /// Collection holding material records.
    pub materials_collection: String,
    /// First segment of every blob key.
    pub storage_prefix: String,
    /// Largest accepted upload in bytes (inclusive).
    pub max_upload_bytes: u64,
    /// Accepted file extensions, lowercase, without the dot.
    pub allowed_extensions: Vec<String>,
    /// Classes offered for selection. Free-text classes are still accepted.
    pub class_catalog: Vec<String>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            profiles_collection: "users".to_string(),
            materials_collection: "materials".to_string(),
            storage_prefix: "materials".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: ["pdf", "doc", "docx", "jpg", "jpeg", "png", "gif"]
                .into_iter()
                .map(String::from)
                .collect(),
            class_catalog: [
                "10th",
                "11th",
                "12th",
                "B.Tech 1st Year",
                "B.Tech 2nd Year",
                "B.Tech 3rd Year",
                "B.Tech 4th Year",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// MIME type for a known document or image extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime)
}

impl HubConfig {
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }

    /// Whether `mime` belongs to one of the allowed extensions.
    pub fn allows_mime(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .filter_map(|e| mime_for_extension(e))
            .any(|m| m == mime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = HubConfig::default();
        assert_eq!(cfg.max_upload_bytes, 10_485_760);
        assert_eq!(cfg.profiles_collection, "users");
        assert_eq!(cfg.class_catalog.len(), 7);
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg: HubConfig = serde_json::from_str(r#"{"max_upload_bytes": 1024}"#).unwrap();
        assert_eq!(cfg.max_upload_bytes, 1024);
        assert_eq!(cfg.materials_collection, "materials");
    }

    #[test]
    fn type_checks() {
        let cfg = HubConfig::default();
        assert!(cfg.allows_extension("PDF"));
        assert!(!cfg.allows_extension("exe"));
        assert!(cfg.allows_mime("image/png"));
        assert!(cfg.allows_mime("Application/PDF"));
        assert!(!cfg.allows_mime("application/zip"));
    }
}
