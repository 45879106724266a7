use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyhub_auth::Identity;
use studyhub_docdb::{DocError, Document};

/// Per-user application record, stored at `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default, with = "chrono::serde::ts_microseconds_option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_microseconds_option")]
    pub last_login: Option<DateTime<Utc>>,
    /// Built locally because the stored profile could not be read or
    /// written. Never persisted.
    #[serde(skip)]
    pub degraded: bool,
}

impl Profile {
    /// In-memory profile for when the profile store is unreachable.
    pub fn fallback(identity: &Identity) -> Self {
        Self {
            uid: identity.id.clone(),
            name: identity.display_name.clone(),
            email: identity.email.clone(),
            photo_url: identity.avatar_url.clone(),
            class: None,
            created_at: None,
            last_login: None,
            degraded: true,
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self, DocError> {
        let mut profile: Profile = doc.decode()?;
        if profile.uid.is_empty() {
            profile.uid = doc.id.clone();
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_wire_names() {
        let doc = Document::new(
            "u1",
            json!({
                "uid": "u1",
                "name": "Asha",
                "email": "asha@example.com",
                "photoURL": null,
                "class": null,
                "createdAt": 1_700_000_000_000_000i64,
                "lastLogin": 1_700_000_100_000_000i64,
            }),
        );
        let p = Profile::from_document(&doc).unwrap();
        assert_eq!(p.class, None);
        assert_eq!(p.created_at.unwrap().timestamp(), 1_700_000_000);
        assert!(!p.degraded);
    }

    #[test]
    fn fallback_is_degraded_without_class() {
        let identity = Identity {
            id: "u1".into(),
            display_name: "Asha".into(),
            email: "asha@example.com".into(),
            avatar_url: None,
            email_verified: true,
        };
        let p = Profile::fallback(&identity);
        assert!(p.degraded);
        assert_eq!(p.class, None);
        assert_eq!(p.uid, "u1");
    }
}
