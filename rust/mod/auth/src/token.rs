//! ID token issuance and verification.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::error::AuthError;
use crate::model::{Claims, Identity};

/// Sign an ID token for `identity`, valid for `ttl` seconds from `now`.
pub fn issue(identity: &Identity, secret: &str, ttl: i64, now: i64) -> Result<(String, Claims), AuthError> {
    let claims = Claims {
        sub: identity.id.clone(),
        name: identity.display_name.clone(),
        email: identity.email.clone(),
        iat: now,
        exp: now + ttl,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Internal(format!("JWT encode failed: {}", e)))?;
    Ok((token, claims))
}

/// Verify and decode an ID token.
pub fn verify(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidCredentials)
}
