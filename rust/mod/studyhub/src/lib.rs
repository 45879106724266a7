//! StudyHub client core.
//!
//! Students sign in, pick their class, and see a live list of study
//! materials shared by classmates. They can filter and search the list,
//! upload files, and delete or re-categorize what they uploaded.
//!
//! The collaborators are traits: an `AuthProvider`, a `DocumentStore` and a
//! `BlobStore`. `StudyHub` ties them together and publishes everything a
//! front-end shows into a path-addressed [`StateStore`](state::StateStore).
//!
//! ```ignore
//! let hub = StudyHub::new(auth, docs, blobs, HubConfig::default());
//! hub.start().await;
//! hub.sign_in(Credentials::email_password("asha@example.com", "secret")).await?;
//! hub.set_class("CSE-2A").await?;
//! let feed = hub.wait_feed_settled().await;
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod hub;
pub mod model;
pub mod mutation;
pub mod repository;
pub mod session;
pub mod state;
pub mod upload;
pub mod view;

pub use config::HubConfig;
pub use error::{
    DownloadError, MutationError, SessionError, UploadError, ValidationError,
};
pub use filter::CategoryFilter;
pub use hub::StudyHub;
pub use model::{Category, Material, Profile};
pub use mutation::is_owner;
pub use session::{ClassUpdate, Session};
pub use upload::{SelectedFile, UploadHandle, UploadRequest};
