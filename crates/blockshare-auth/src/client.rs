//! HTTP client for the account backend.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use blockshare_core::{ClientStore, USER_EMAIL_KEY, USERNAME_KEY};

use crate::error::AuthError;
use crate::session::{AuthSession, DEFAULT_USERNAME, TokenClaims};
use crate::validation::{
    RegisterForm, validate_email, validate_login, validate_password, validate_password_strength,
    validate_username,
};

pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:8000/api/";

/// Account backend location.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL; endpoints are joined onto it (`{base}login/`).
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl AuthConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    #[serde(alias = "user_id")]
    user_id: Option<Value>,
    email: Option<String>,
    username: Option<String>,
    error: Option<String>,
}

impl AuthResponse {
    fn user_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn into_session(self) -> Result<AuthSession, AuthError> {
        let user_id = self.user_id().unwrap_or_default();
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("missing token".into()))?;
        Ok(AuthSession {
            token,
            user_id,
            email: self.email.unwrap_or_default(),
            username: self
                .username
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
        })
    }
}

/// Identity confirmed by `verify-token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub user_id: Option<String>,
    pub email: Option<String>,
}

/// Client for login, registration, and profile management.
///
/// Successful logins persist the session through the [`ClientStore`];
/// every other call reads the token from it.
pub struct AuthClient {
    http: reqwest::Client,
    config: AuthConfig,
    store: Arc<dyn ClientStore>,
}

impl AuthClient {
    pub fn new(config: AuthConfig, store: Arc<dyn ClientStore>) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;
        Ok(Self {
            http,
            config,
            store,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        validate_login(email, password)?;
        let body = json!({
            "email": email.trim().to_lowercase(),
            "password": password,
        });
        let session = self
            .call(Method::POST, "login/", Some(body), None)
            .await?
            .into_session()?;
        session.save(self.store.as_ref())?;
        info!(user_id = %session.user_id, "Logged in");
        Ok(session)
    }

    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &RegisterForm) -> Result<AuthSession, AuthError> {
        form.validate()?;
        let body = json!({
            "username": form.username.trim(),
            "email": form.email.trim().to_lowercase(),
            "password": form.password,
        });
        let session = self
            .call(Method::POST, "register/", Some(body), None)
            .await?
            .into_session()?;
        session.save(self.store.as_ref())?;
        info!(user_id = %session.user_id, "Registered");
        Ok(session)
    }

    /// Ask the backend whether the stored token is still valid.
    #[instrument(skip(self))]
    pub async fn verify_token(&self) -> Result<VerifiedToken, AuthError> {
        let token = self.token()?;
        let response = self
            .call(Method::GET, "verify-token/", None, Some(&token))
            .await?;
        Ok(VerifiedToken {
            user_id: response.user_id(),
            email: response.email,
        })
    }

    #[instrument(skip_all)]
    pub async fn change_password(&self, current: &str, new: &str) -> Result<(), AuthError> {
        if current.is_empty() || new.is_empty() {
            return Err(AuthError::invalid("Please fill in all fields"));
        }
        validate_password_strength(new)?;
        let token = self.token()?;
        let body = json!({ "current_password": current, "new_password": new });
        self.call(Method::POST, "change-password/", Some(body), Some(&token))
            .await?;
        info!("Password changed");
        Ok(())
    }

    /// Update username and email, then refresh the stored copies.
    #[instrument(skip(self))]
    pub async fn update_profile(&self, username: &str, email: &str) -> Result<AuthSession, AuthError> {
        validate_username(username.trim())?;
        validate_email(email)?;
        let token = self.token()?;
        let body = json!({
            "username": username.trim(),
            "email": email.trim().to_lowercase(),
        });
        let response = self
            .call(Method::POST, "update-profile/", Some(body), Some(&token))
            .await?;

        let username = response
            .username
            .unwrap_or_else(|| username.trim().to_string());
        let email = response
            .email
            .unwrap_or_else(|| email.trim().to_lowercase());
        self.store.set(USERNAME_KEY, &username)?;
        self.store.set(USER_EMAIL_KEY, &email)?;

        AuthSession::load(self.store.as_ref())?.ok_or(AuthError::NotLoggedIn)
    }

    /// Delete the account and drop the local session.
    #[instrument(skip_all)]
    pub async fn delete_account(&self, password: &str) -> Result<(), AuthError> {
        validate_password(password)?;
        let token = self.token()?;
        self.call(
            Method::POST,
            "delete-account/",
            Some(json!({ "password": password })),
            Some(&token),
        )
        .await?;
        self.logout()?;
        info!("Account deleted");
        Ok(())
    }

    /// Local only: the backend keeps no session state.
    pub fn logout(&self) -> Result<(), AuthError> {
        AuthSession::clear(self.store.as_ref())?;
        debug!("Cleared stored session");
        Ok(())
    }

    pub fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(AuthSession::load(self.store.as_ref())?)
    }

    /// A token is stored, has the JWT shape, and has not expired.
    pub fn is_authenticated(&self) -> bool {
        let Ok(Some(session)) = AuthSession::load(self.store.as_ref()) else {
            return false;
        };
        match TokenClaims::decode(&session.token) {
            Some(claims) => !claims.is_expired_at(chrono::Utc::now().timestamp()),
            None => false,
        }
    }

    fn token(&self) -> Result<String, AuthError> {
        AuthSession::load(self.store.as_ref())?
            .map(|s| s.token)
            .ok_or(AuthError::NotLoggedIn)
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let url = format!("{}{}", self.config.base_url, path);
        let request = self.http.request(method, url);
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Result<AuthResponse, AuthError> {
        let mut request = self.request(method, path, token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, path, "Auth backend unreachable");
            AuthError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let parsed: Option<AuthResponse> = serde_json::from_str(&text).ok();

        match parsed {
            Some(parsed) if status.is_success() && parsed.success => Ok(parsed),
            Some(parsed) => Err(rejected(status, parsed.error.unwrap_or_default())),
            None if status.is_success() => Err(AuthError::Malformed(text)),
            None => Err(rejected(status, text)),
        }
    }
}

fn rejected(status: StatusCode, message: String) -> AuthError {
    let message = if message.trim().is_empty() {
        format!("Request failed with status {}", status.as_u16())
    } else {
        message
    };
    warn!(status = status.as_u16(), %message, "Auth backend rejected request");
    AuthError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::MemoryClientStore;

    fn client() -> (AuthClient, Arc<MemoryClientStore>) {
        let store = Arc::new(MemoryClientStore::new());
        let client = AuthClient::new(
            AuthConfig::default().with_base_url("http://127.0.0.1:1/api"),
            store.clone(),
        )
        .unwrap();
        (client, store)
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let (client, _) = client();
        assert_eq!(client.config().base_url, "http://127.0.0.1:1/api/");
    }

    #[test]
    fn test_numeric_user_id_becomes_string() {
        let response: AuthResponse =
            serde_json::from_str(r#"{"success":true,"token":"t","userId":42}"#).unwrap();
        let session = response.into_session().unwrap();
        assert_eq!(session.user_id, "42");
        assert_eq!(session.username, DEFAULT_USERNAME);
    }

    #[tokio::test]
    async fn test_invalid_input_sends_nothing() {
        let (client, _) = client();
        // The base URL points at a closed port, so anything that got past
        // validation would come back as Unreachable.
        assert!(matches!(
            client.login("bad-email", "secret1").await,
            Err(AuthError::Invalid(_))
        ));
        assert!(matches!(
            client
                .register(&RegisterForm::new("al", "a@b.co", "Secret1"))
                .await,
            Err(AuthError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_token_calls_need_login() {
        let (client, _) = client();
        assert_eq!(client.verify_token().await, Err(AuthError::NotLoggedIn));
        assert!(!client.is_authenticated());
    }
}
