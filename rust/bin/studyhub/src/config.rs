//! Client configuration.
//!
//! Reads/writes `~/.studyhub/config.toml`.

use std::path::{Path, PathBuf};

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};

use studyhub::HubConfig;
use studyhub_auth::AuthConfig;
use studyhub_blob::file::DEFAULT_CHUNK_SIZE;

/// Client configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Where the document database and blobs live.
    pub data_dir: PathBuf,

    /// Bucket name used in file URLs.
    pub bucket: String,

    /// Upload chunk size in bytes.
    pub chunk_size: usize,

    pub auth: AuthConfig,

    pub hub: HubConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs_path().join("data"),
            bucket: "studyhub".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            auth: AuthConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default config file path: ~/.studyhub/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk. A missing file is created with a fresh
    /// token secret.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            config.auth.jwt_secret = random_secret();
            config.save(path)?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Return the StudyHub config directory (~/.studyhub).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".studyhub")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let first = ClientConfig::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.auth.jwt_secret.len(), 64);
        assert_ne!(first.auth.jwt_secret, AuthConfig::default().jwt_secret);

        let second = ClientConfig::load(&path).unwrap();
        assert_eq!(second.auth.jwt_secret, first.auth.jwt_secret);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
bucket = "campus"

[hub]
max_upload_bytes = 1024
"#,
        )
        .unwrap();
        assert_eq!(config.bucket, "campus");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.hub.max_upload_bytes, 1024);
        assert_eq!(config.hub.materials_collection, "materials");
    }
}
