use serde::{Deserialize, Serialize};

/// Configuration for the local auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT signing secret.
    pub jwt_secret: String,
    /// ID token lifetime in seconds (default: 1h).
    pub token_ttl: i64,
    /// Minimum password length for registration and reset.
    pub min_password_len: usize,
    /// Password reset code lifetime in seconds (default: 1h).
    pub reset_code_ttl: i64,
    /// Keep the signed-in account across restarts.
    pub persist_session: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "studyhub-dev-secret-change-me".to_string(),
            token_ttl: 3600,
            min_password_len: 6,
            reset_code_ttl: 3600,
            persist_session: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let cfg: AuthConfig = serde_json::from_str(r#"{"persist_session": true}"#).unwrap();
        assert!(cfg.persist_session);
        assert_eq!(cfg.min_password_len, 6);
        assert_eq!(cfg.token_ttl, 3600);
    }
}
