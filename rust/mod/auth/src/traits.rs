use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::model::{Credentials, Identity, Registration};

/// AuthProvider is the authentication contract the client relies on.
///
/// The provider owns the current identity. `watch()` notifies on every
/// change: sign-in, sign-out, and the initial resolution of a restored
/// session. Sign-in failures leave the current identity untouched.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Interactive sign-in. Returns `AuthError::Cancelled` when the user
    /// dismisses a federated flow.
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, AuthError>;

    /// Create an email/password account and sign in as it.
    async fn register(&self, registration: Registration) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The current identity, if signed in.
    fn current(&self) -> Option<Identity>;

    /// Identity change stream.
    fn watch(&self) -> watch::Receiver<Option<Identity>>;

    /// An ID token for the current identity. `force_refresh` bypasses the
    /// cached token.
    async fn id_token(&self, force_refresh: bool) -> Result<String, AuthError>;

    /// Send a password reset code to the account's email.
    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;

    /// Consume a reset code and set a new password.
    async fn confirm_password_reset(&self, code: &str, new_password: &str)
        -> Result<(), AuthError>;
}
