//! The logged-in account as persisted in the client store.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use blockshare_core::{
    ClientStore, StoreError, USER_EMAIL_KEY, USER_ID_KEY, USER_TOKEN_KEY, USERNAME_KEY,
};

/// Shown when the backend returns no username.
pub const DEFAULT_USERNAME: &str = "User";

/// Token and account details returned on login or registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
}

impl AuthSession {
    pub fn save(&self, store: &dyn ClientStore) -> Result<(), StoreError> {
        store.set(USER_TOKEN_KEY, &self.token)?;
        store.set(USER_EMAIL_KEY, &self.email)?;
        store.set(USER_ID_KEY, &self.user_id)?;
        store.set(USERNAME_KEY, &self.username)
    }

    /// `None` unless a token is stored.
    pub fn load(store: &dyn ClientStore) -> Result<Option<Self>, StoreError> {
        let Some(token) = store.get(USER_TOKEN_KEY)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            token,
            user_id: store.get(USER_ID_KEY)?.unwrap_or_default(),
            email: store.get(USER_EMAIL_KEY)?.unwrap_or_default(),
            username: store
                .get(USERNAME_KEY)?
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        }))
    }

    pub fn clear(store: &dyn ClientStore) -> Result<(), StoreError> {
        for key in [USER_TOKEN_KEY, USER_EMAIL_KEY, USER_ID_KEY, USERNAME_KEY] {
            store.remove(key)?;
        }
        Ok(())
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        TokenClaims::decode(&self.token)
    }
}

/// Unverified payload of a JWT.
///
/// The signature is checked by the backend on `verify-token`; locally only
/// the shape and expiry are inspected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiry as seconds since the Unix epoch.
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decode `header.payload.signature`; anything else is `None`.
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::MemoryClientStore;

    fn token(payload: &str) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        )
    }

    #[test]
    fn test_decode_claims() {
        let claims = TokenClaims::decode(&token(r#"{"user_id":7,"email":"a@b.co","exp":100}"#)).unwrap();
        assert_eq!(claims.email.as_deref(), Some("a@b.co"));
        assert!(claims.is_expired_at(100));
        assert!(!claims.is_expired_at(99));
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        assert!(TokenClaims::decode("not-a-token").is_none());
        assert!(TokenClaims::decode("a.b").is_none());
        assert!(TokenClaims::decode("a.b.c.d").is_none());
        assert!(TokenClaims::decode(&format!("h.{}.s", URL_SAFE_NO_PAD.encode(b"not json"))).is_none());
    }

    #[test]
    fn test_save_load_clear() {
        let store = MemoryClientStore::new();
        assert_eq!(AuthSession::load(&store).unwrap(), None);

        let session = AuthSession {
            token: token("{}"),
            user_id: "7".into(),
            email: "a@b.co".into(),
            username: "alice".into(),
        };
        session.save(&store).unwrap();
        assert_eq!(AuthSession::load(&store).unwrap(), Some(session));

        AuthSession::clear(&store).unwrap();
        assert!(store.is_empty());
    }
}
