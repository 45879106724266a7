//! Subcommand implementations.
//!
//! Each run opens the embedded stores under the configured data directory
//! and drives a `StudyHub`, the same way a graphical client would.

pub mod account;
pub mod class;
pub mod material;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::debug;

use studyhub::{Material, StudyHub};
use studyhub_auth::LocalAuthProvider;
use studyhub_blob::FileStore;
use studyhub_docdb::{DocumentStore, RedbDocs};

use crate::config::ClientConfig;

/// An opened client.
pub struct App {
    pub hub: Arc<StudyHub>,
    pub auth: Arc<LocalAuthProvider>,
}

impl App {
    pub async fn open(config: &ClientConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("creating {}", config.data_dir.display()))?;

        let db_path = config.data_dir.join("studyhub.redb");
        let docs: Arc<dyn DocumentStore> = Arc::new(
            RedbDocs::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?,
        );
        let blobs = Arc::new(
            FileStore::open(&config.data_dir.join("blobs"), &config.bucket)?
                .with_chunk_size(config.chunk_size),
        );

        // Each invocation is a new process; the sign-in has to outlive it.
        let mut auth_config = config.auth.clone();
        auth_config.persist_session = true;
        let auth = Arc::new(LocalAuthProvider::open(docs.clone(), auth_config).await?);

        let hub = StudyHub::new(auth.clone(), docs, blobs, config.hub.clone());
        hub.start().await;
        debug!(data_dir = %config.data_dir.display(), "client opened");
        Ok(Self { hub, auth })
    }

    pub async fn close(self) {
        self.hub.shutdown().await;
    }

    /// The signed-in user's class, once its feed has settled.
    pub async fn require_class(&self) -> Result<String> {
        let state = self.hub.auth_state();
        if !state.is_authenticated() {
            anyhow::bail!("Not signed in. Run `studyhub login`.");
        }
        let class = state
            .class()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No class selected. Run `studyhub class set <class>`."))?;
        self.hub.wait_feed_settled().await;
        Ok(class)
    }

    /// A material of the active class by id.
    pub async fn material(&self, id: &str) -> Result<Material> {
        let class = self.require_class().await?;
        self.hub
            .find_material(id)
            .ok_or_else(|| anyhow::anyhow!("No material {} in class {}.", id, class))
    }
}

/// Read a line from stdin after printing `prompt` to stderr.
pub fn prompt(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

/// Ask for a password unless one was given.
pub fn password(given: Option<String>, prompt: &str) -> Result<String> {
    let password = match given {
        Some(p) => p,
        None => rpassword::prompt_password(prompt)?,
    };
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty.");
    }
    Ok(password)
}
