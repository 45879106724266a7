use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use studyhub_docdb::{new_id, DocumentStore, Query};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::model::{Account, Claims, Credentials, GoogleAccount, Identity, Registration, ResetRecord};
use crate::password::{hash_password, verify_password};
use crate::token;
use crate::traits::AuthProvider;

const ACCOUNTS: &str = "accounts";
const RESETS: &str = "password_resets";
const SESSIONS: &str = "auth_sessions";
const CURRENT_SESSION: &str = "current";

/// Cached tokens this close to expiry (seconds) are re-issued.
const TOKEN_REFRESH_MARGIN: i64 = 60;

/// A password reset message. There is no mail transport; messages are
/// kept in the provider's outbox and logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetMail {
    pub email: String,
    pub code: String,
}

struct CachedToken {
    token: String,
    account_id: String,
    exp: i64,
}

/// LocalAuthProvider is an AuthProvider whose accounts live in a
/// DocumentStore (`accounts/{id}`).
///
/// Federated accounts are keyed by provider subject. One account per
/// email: a federated sign-in whose email already belongs to another
/// account is refused rather than linked. With
/// `persist_session` the signed-in account survives a restart
/// (`auth_sessions/current`).
pub struct LocalAuthProvider {
    docs: Arc<dyn DocumentStore>,
    config: AuthConfig,
    current: watch::Sender<Option<Identity>>,
    token: tokio::sync::Mutex<Option<CachedToken>>,
    outbox: Mutex<Vec<ResetMail>>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail(email.to_string()))
    }
}

/// Run CPU-heavy password work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, AuthError>
where
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AuthError::Internal(e.to_string()))?
}

impl LocalAuthProvider {
    /// Create the provider, restoring a persisted session when enabled.
    pub async fn open(docs: Arc<dyn DocumentStore>, config: AuthConfig) -> Result<Self, AuthError> {
        let (current, _) = watch::channel(None);
        let provider = Self {
            docs,
            config,
            current,
            token: tokio::sync::Mutex::new(None),
            outbox: Mutex::new(Vec::new()),
        };
        if provider.config.persist_session {
            if let Some(identity) = provider.restore_session().await? {
                provider.current.send_replace(Some(identity));
            }
        }
        Ok(provider)
    }

    /// Reset messages sent so far, oldest first.
    pub fn outbox(&self) -> Vec<ResetMail> {
        self.outbox.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Verify an ID token issued by this provider.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        token::verify(token, &self.config.jwt_secret)
    }

    async fn restore_session(&self) -> Result<Option<Identity>, AuthError> {
        let Some(doc) = self.docs.get(SESSIONS, CURRENT_SESSION).await? else {
            return Ok(None);
        };
        let Some(account_id) = doc.field("accountId").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        match self.docs.get(ACCOUNTS, account_id).await? {
            Some(doc) => {
                let account: Account = doc.decode()?;
                info!(account = %account.id, "session restored");
                Ok(Some(account.identity()))
            }
            None => {
                warn!(account = %account_id, "persisted session refers to a missing account");
                self.docs.delete(SESSIONS, CURRENT_SESSION).await?;
                Ok(None)
            }
        }
    }

    async fn find_one(&self, field: &str, value: &str) -> Result<Option<Account>, AuthError> {
        let found = self
            .docs
            .query(&Query::collection(ACCOUNTS).where_eq(field, value).limit(1))
            .await?;
        match found.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn insert_account(&self, account: &Account) -> Result<(), AuthError> {
        let body = serde_json::to_value(account).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.docs.set(ACCOUNTS, &account.id, body).await?;
        info!(account = %account.id, email = %account.email, "account created");
        Ok(())
    }

    async fn establish(&self, account: &Account) -> Result<Identity, AuthError> {
        let identity = account.identity();
        if self.config.persist_session {
            self.docs
                .set(SESSIONS, CURRENT_SESSION, json!({ "accountId": account.id }))
                .await?;
        }
        *self.token.lock().await = None;
        self.current.send_replace(Some(identity.clone()));
        info!(account = %account.id, "signed in");
        Ok(identity)
    }

    async fn password_account(&self, email: &str, password: String) -> Result<Account, AuthError> {
        let email = normalize_email(email);
        let account = self
            .find_one("email", &email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let Some(hash) = account.password_hash.clone() else {
            return Err(AuthError::InvalidCredentials);
        };
        if blocking(move || Ok(verify_password(&password, &hash))).await? {
            Ok(account)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    async fn google_account(&self, google: GoogleAccount) -> Result<Account, AuthError> {
        if let Some(account) = self.find_one("googleSubject", &google.subject).await? {
            return Ok(account);
        }

        let email = normalize_email(&google.email);
        if let Some(account) = self.find_one("email", &email).await? {
            warn!(account = %account.id, "federated sign-in for an email owned by another credential");
            return Err(AuthError::AccountExistsWithDifferentCredential(email));
        }

        let display_name = match google.display_name.trim() {
            "" => email.clone(),
            name => name.to_string(),
        };
        let account = Account {
            id: new_id(),
            display_name,
            email,
            avatar_url: google.avatar_url,
            email_verified: true,
            password_hash: None,
            google_subject: Some(google.subject),
            created_at: chrono::Utc::now().timestamp_micros(),
        };
        self.insert_account(&account).await?;
        Ok(account)
    }

    fn check_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.config.min_password_len {
            return Err(AuthError::WeakPassword(self.config.min_password_len));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in(&self, credentials: Credentials) -> Result<Identity, AuthError> {
        let account = match credentials {
            Credentials::EmailPassword { email, password } => {
                self.password_account(&email, password).await
            }
            Credentials::Google(google) => self.google_account(google).await,
        };
        match account {
            Ok(account) => self.establish(&account).await,
            Err(e) => {
                debug!(error = %e, "sign-in rejected");
                Err(e)
            }
        }
    }

    async fn register(&self, registration: Registration) -> Result<Identity, AuthError> {
        let display_name = registration.display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(AuthError::Validation("Please enter your name.".into()));
        }
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        self.check_password(&registration.password)?;
        if self.find_one("email", &email).await?.is_some() {
            return Err(AuthError::EmailInUse(email));
        }

        let password = registration.password;
        let hash = blocking(move || hash_password(&password)).await?;
        let account = Account {
            id: new_id(),
            display_name,
            email,
            avatar_url: None,
            email_verified: false,
            password_hash: Some(hash),
            google_subject: None,
            created_at: chrono::Utc::now().timestamp_micros(),
        };
        self.insert_account(&account).await?;
        self.establish(&account).await
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self.token.lock().await = None;
        if let Some(previous) = self.current.send_replace(None) {
            info!(account = %previous.id, "signed out");
        }
        if self.config.persist_session {
            self.docs.delete(SESSIONS, CURRENT_SESSION).await?;
        }
        Ok(())
    }

    fn current(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    async fn id_token(&self, force_refresh: bool) -> Result<String, AuthError> {
        let identity = self.current().ok_or(AuthError::NotSignedIn)?;
        let now = chrono::Utc::now().timestamp();

        let mut cached = self.token.lock().await;
        if !force_refresh {
            if let Some(t) = cached.as_ref() {
                if t.account_id == identity.id && t.exp - TOKEN_REFRESH_MARGIN > now {
                    return Ok(t.token.clone());
                }
            }
        }

        let (token, claims) =
            token::issue(&identity, &self.config.jwt_secret, self.config.token_ttl, now)?;
        *cached = Some(CachedToken {
            token: token.clone(),
            account_id: identity.id,
            exp: claims.exp,
        });
        debug!(forced = force_refresh, "id token issued");
        Ok(token)
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        let account = self
            .find_one("email", &email)
            .await?
            .ok_or_else(|| AuthError::AccountNotFound(email.clone()))?;

        // A new request replaces any code still pending for the account.
        let pending = self
            .docs
            .query(&Query::collection(RESETS).where_eq("accountId", account.id.as_str()))
            .await?;
        for doc in pending {
            self.docs.delete(RESETS, &doc.id).await?;
        }

        let code = new_id();
        let record = ResetRecord {
            account_id: account.id,
            expires_at: chrono::Utc::now().timestamp() + self.config.reset_code_ttl,
        };
        let body = serde_json::to_value(&record).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.docs.set(RESETS, &code, body).await?;

        info!(email = %email, "password reset code sent");
        self.outbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ResetMail { email, code });
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let code = code.trim();
        if code.is_empty() || code.contains('/') {
            return Err(AuthError::InvalidResetCode);
        }
        self.check_password(new_password)?;

        let doc = self
            .docs
            .get(RESETS, code)
            .await?
            .ok_or(AuthError::InvalidResetCode)?;
        // Single use: consumed before anything else can fail.
        self.docs.delete(RESETS, code).await?;
        let record: ResetRecord = doc.decode()?;
        if record.expires_at <= chrono::Utc::now().timestamp() {
            return Err(AuthError::InvalidResetCode);
        }

        let password = new_password.to_string();
        let hash = blocking(move || hash_password(&password)).await?;
        match self
            .docs
            .update(ACCOUNTS, &record.account_id, json!({ "passwordHash": hash }))
            .await
        {
            Ok(_) => {
                info!(account = %record.account_id, "password reset");
                Ok(())
            }
            Err(studyhub_docdb::DocError::NotFound(_)) => Err(AuthError::InvalidResetCode),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhub_docdb::MemoryDocs;

    async fn provider(docs: Arc<dyn DocumentStore>, config: AuthConfig) -> LocalAuthProvider {
        LocalAuthProvider::open(docs, config).await.unwrap()
    }

    async fn fresh() -> LocalAuthProvider {
        provider(Arc::new(MemoryDocs::new()), AuthConfig::default()).await
    }

    fn asha() -> Registration {
        Registration {
            display_name: "  Asha  ".into(),
            email: "Asha@Example.com".into(),
            password: "hunter22".into(),
        }
    }

    fn google(subject: &str, email: &str) -> GoogleAccount {
        GoogleAccount {
            subject: subject.into(),
            display_name: "Ravi".into(),
            email: email.into(),
            avatar_url: Some("https://img.example.com/ravi.png".into()),
        }
    }

    #[tokio::test]
    async fn register_signs_in() {
        let auth = fresh().await;
        let mut rx = auth.watch();
        let identity = auth.register(asha()).await.unwrap();
        assert_eq!(identity.display_name, "Asha");
        assert_eq!(identity.email, "asha@example.com");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref(), Some(&identity));
        assert_eq!(auth.current(), Some(identity));
    }

    #[tokio::test]
    async fn password_sign_in_checks_hash() {
        let auth = fresh().await;
        auth.register(asha()).await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current().is_none());

        let err = auth
            .sign_in(Credentials::email_password("asha@example.com", "wrong-pass"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(auth.current().is_none());

        let err = auth
            .sign_in(Credentials::email_password("nobody@example.com", "hunter22"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);

        let identity = auth
            .sign_in(Credentials::email_password(" ASHA@example.com ", "hunter22"))
            .await
            .unwrap();
        assert_eq!(identity.display_name, "Asha");
    }

    #[tokio::test]
    async fn registration_validation() {
        let auth = fresh().await;
        auth.register(asha()).await.unwrap();

        let dup = auth.register(asha()).await.unwrap_err();
        assert!(matches!(dup, AuthError::EmailInUse(_)));

        let weak = auth
            .register(Registration {
                password: "12345".into(),
                email: "b@example.com".into(),
                ..asha()
            })
            .await
            .unwrap_err();
        assert_eq!(weak, AuthError::WeakPassword(6));

        let bad = auth
            .register(Registration {
                email: "not-an-email".into(),
                ..asha()
            })
            .await
            .unwrap_err();
        assert!(matches!(bad, AuthError::InvalidEmail(_)));

        let nameless = auth
            .register(Registration {
                display_name: "   ".into(),
                email: "c@example.com".into(),
                ..asha()
            })
            .await
            .unwrap_err();
        assert!(matches!(nameless, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn google_sign_in_is_stable_per_subject() {
        let auth = fresh().await;
        let first = auth
            .sign_in(Credentials::Google(google("g-1", "ravi@example.com")))
            .await
            .unwrap();
        assert!(first.email_verified);
        auth.sign_out().await.unwrap();

        let again = auth
            .sign_in(Credentials::Google(google("g-1", "ravi@example.com")))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
    }

    #[tokio::test]
    async fn google_sign_in_cannot_claim_password_account() {
        let auth = fresh().await;
        let registered = auth.register(asha()).await.unwrap();
        auth.sign_out().await.unwrap();

        let err = auth
            .sign_in(Credentials::Google(google("anything", "asha@example.com")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::AccountExistsWithDifferentCredential("asha@example.com".into())
        );
        assert!(auth.current().is_none());

        // The password account is untouched.
        let back = auth
            .sign_in(Credentials::email_password("asha@example.com", "hunter22"))
            .await
            .unwrap();
        assert_eq!(back.id, registered.id);
    }

    #[tokio::test]
    async fn google_sign_in_cannot_claim_another_google_account() {
        let auth = fresh().await;
        let first = auth
            .sign_in(Credentials::Google(google("g-1", "ravi@example.com")))
            .await
            .unwrap();
        auth.sign_out().await.unwrap();

        let err = auth
            .sign_in(Credentials::Google(google("g-2", "ravi@example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AccountExistsWithDifferentCredential(_)));

        let again = auth
            .sign_in(Credentials::Google(google("g-1", "ravi@example.com")))
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn id_token_requires_identity_and_is_cached() {
        let auth = fresh().await;
        assert_eq!(auth.id_token(false).await.unwrap_err(), AuthError::NotSignedIn);

        let identity = auth.register(asha()).await.unwrap();
        let a = auth.id_token(false).await.unwrap();
        let b = auth.id_token(false).await.unwrap();
        assert_eq!(a, b);
        let forced = auth.id_token(true).await.unwrap();
        assert_eq!(auth.verify_token(&forced).unwrap().sub, identity.id);

        auth.sign_out().await.unwrap();
        assert_eq!(auth.id_token(true).await.unwrap_err(), AuthError::NotSignedIn);
    }

    #[tokio::test]
    async fn persisted_session_is_restored() {
        let docs: Arc<dyn DocumentStore> = Arc::new(MemoryDocs::new());
        let config = AuthConfig {
            persist_session: true,
            ..AuthConfig::default()
        };

        let identity = {
            let auth = provider(docs.clone(), config.clone()).await;
            auth.register(asha()).await.unwrap()
        };
        let reopened = provider(docs.clone(), config.clone()).await;
        assert_eq!(reopened.current(), Some(identity));

        reopened.sign_out().await.unwrap();
        let after_sign_out = provider(docs, config).await;
        assert!(after_sign_out.current().is_none());
    }

    #[tokio::test]
    async fn session_not_restored_without_persistence() {
        let docs: Arc<dyn DocumentStore> = Arc::new(MemoryDocs::new());
        provider(docs.clone(), AuthConfig::default())
            .await
            .register(asha())
            .await
            .unwrap();
        assert!(provider(docs, AuthConfig::default()).await.current().is_none());
    }

    #[tokio::test]
    async fn password_reset_is_single_use() {
        let auth = fresh().await;
        auth.register(asha()).await.unwrap();
        auth.sign_out().await.unwrap();

        auth.send_password_reset("asha@example.com").await.unwrap();
        let mail = auth.outbox().pop().unwrap();
        assert_eq!(mail.email, "asha@example.com");
        assert_ne!(mail.code.len(), 6);

        assert_eq!(
            auth.confirm_password_reset(&mail.code, "short").await.unwrap_err(),
            AuthError::WeakPassword(6)
        );
        auth.confirm_password_reset(&mail.code, "new-password").await.unwrap();
        assert_eq!(
            auth.confirm_password_reset(&mail.code, "another-one").await.unwrap_err(),
            AuthError::InvalidResetCode
        );

        auth.sign_in(Credentials::email_password("asha@example.com", "new-password"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_reset_code_rejected() {
        let config = AuthConfig {
            reset_code_ttl: 0,
            ..AuthConfig::default()
        };
        let auth = provider(Arc::new(MemoryDocs::new()), config).await;
        auth.register(asha()).await.unwrap();
        auth.send_password_reset("asha@example.com").await.unwrap();
        let code = auth.outbox().pop().unwrap().code;
        assert_eq!(
            auth.confirm_password_reset(&code, "new-password").await.unwrap_err(),
            AuthError::InvalidResetCode
        );
    }

    #[tokio::test]
    async fn reset_codes_are_per_request_and_replace_pending_ones() {
        let auth = fresh().await;
        auth.register(asha()).await.unwrap();
        auth.register(Registration {
            display_name: "Ravi".into(),
            email: "ravi@example.com".into(),
            password: "hunter33".into(),
        })
        .await
        .unwrap();
        auth.sign_out().await.unwrap();

        auth.send_password_reset("asha@example.com").await.unwrap();
        auth.send_password_reset("ravi@example.com").await.unwrap();
        auth.send_password_reset("asha@example.com").await.unwrap();
        let mails = auth.outbox();
        assert_eq!(mails.len(), 3);
        let (stale, ravi, asha) = (&mails[0].code, &mails[1].code, &mails[2].code);
        assert_ne!(stale, asha);
        assert_ne!(ravi, asha);

        assert_eq!(
            auth.confirm_password_reset(stale, "new-password").await.unwrap_err(),
            AuthError::InvalidResetCode
        );
        auth.confirm_password_reset(ravi, "ravi-new-pass").await.unwrap();
        auth.confirm_password_reset(asha, "asha-new-pass").await.unwrap();

        auth.sign_in(Credentials::email_password("ravi@example.com", "ravi-new-pass"))
            .await
            .unwrap();
        auth.sign_in(Credentials::email_password("asha@example.com", "asha-new-pass"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_for_unknown_email() {
        let auth = fresh().await;
        let err = auth.send_password_reset("ghost@example.com").await.unwrap_err();
        assert!(matches!(err, AuthError::AccountNotFound(_)));
        assert!(auth.outbox().is_empty());
    }
}
