use studyhub_docdb::DocError;
use thiserror::Error;

/// Auth error type.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The user dismissed an interactive sign-in flow.
    #[error("sign-in cancelled")]
    Cancelled,

    #[error("email already in use: {0}")]
    EmailInUse(String),

    /// The email belongs to an account that signs in another way.
    #[error("account exists with different credential: {0}")]
    AccountExistsWithDifferentCredential(String),

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("invalid email: {0}")]
    InvalidEmail(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("no account for {0}")]
    AccountNotFound(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("invalid or expired reset code")]
    InvalidResetCode,

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl AuthError {
    /// Short message fit for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password.".into(),
            AuthError::Cancelled => "Sign-in was cancelled.".into(),
            AuthError::EmailInUse(_) => "An account with this email already exists.".into(),
            AuthError::AccountExistsWithDifferentCredential(_) => {
                "An account with this email already exists. Sign in with your password.".into()
            }
            AuthError::WeakPassword(n) => format!("Password must be at least {} characters.", n),
            AuthError::InvalidEmail(_) => "Please enter a valid email address.".into(),
            AuthError::Validation(m) => m.clone(),
            AuthError::AccountNotFound(_) => "No account found with this email.".into(),
            AuthError::NotSignedIn => "Please sign in first.".into(),
            AuthError::InvalidResetCode => "This reset code is invalid or has expired.".into(),
            AuthError::Storage(_) | AuthError::Internal(_) => {
                "Something went wrong. Please try again.".into()
            }
        }
    }
}

impl From<DocError> for AuthError {
    fn from(e: DocError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
