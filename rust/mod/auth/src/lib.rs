//! Authentication for the StudyHub client.
//!
//! # Contract
//!
//! - **AuthProvider**: interactive sign-in (federated and email/password),
//!   sign-out, an identity change stream, ID tokens with forced refresh,
//!   registration and password reset.
//!
//! # Reference provider
//!
//! `LocalAuthProvider` keeps accounts in a `DocumentStore`, hashes passwords
//! with argon2id and signs ID tokens as HS256 JWTs.
//!
//! ```ignore
//! use studyhub_auth::{AuthConfig, Credentials, LocalAuthProvider};
//!
//! let auth = LocalAuthProvider::open(docs, AuthConfig::default()).await?;
//! let identity = auth.sign_in(Credentials::email_password("a@b.c", "secret")).await?;
//! ```

pub mod config;
pub mod error;
pub mod local;
pub mod model;
pub mod password;
pub mod token;
pub mod traits;

pub use config::AuthConfig;
pub use error::AuthError;
pub use local::{LocalAuthProvider, ResetMail};
pub use model::{Claims, Credentials, GoogleAccount, Identity, Registration};
pub use traits::AuthProvider;
