use serde::{Deserialize, Serialize};

/// An authenticated subject as issued by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable account id.
    pub id: String,
    pub display_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Account details returned by a federated (Google) sign-in flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleAccount {
    /// Provider-side subject id. Stable across sign-ins.
    pub subject: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    EmailPassword { email: String, password: String },
    Google(GoogleAccount),
}

impl Credentials {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::EmailPassword {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// New email/password account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub display_name: String,
    pub email: String,
    pub password: String,
}

/// JWT claims payload of an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account id.
    pub sub: String,

    /// Display name.
    pub name: String,

    pub email: String,

    /// Issued at (unix timestamp).
    pub iat: i64,

    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// Stored account record (`accounts/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Account {
    pub id: String,
    pub display_name: String,
    /// Lowercased.
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_subject: Option<String>,
    /// Microseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl Account {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            avatar_url: self.avatar_url.clone(),
            email_verified: self.email_verified,
        }
    }
}

/// Pending password reset (`password_resets/{code}`), one per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResetRecord {
    pub account_id: String,
    /// Unix seconds.
    pub expires_at: i64,
}
