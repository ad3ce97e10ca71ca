//! Firebase Identity Toolkit backend.
//!
//! Firebase owns the accounts and checks the credentials. The session handed
//! back to the caller is the daemon's own token, so its lifetime follows
//! `session_ttl_days` rather than the one-hour ID token.

use super::session::SessionStore;
use super::{IdentityError, IdentityProvider, SessionGrant};
use crate::config::AuthConfig;
use async_trait::async_trait;
use gaugyan_common::UserId;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub struct FirebaseIdentityProvider {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sessions: SessionStore,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    id_token: String,
    local_id: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

impl FirebaseIdentityProvider {
    pub fn new(config: &AuthConfig, api_key: impl Into<String>, sessions: SessionStore) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            endpoint: config.firebase_endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            sessions,
        }
    }

    pub fn from_env(config: &AuthConfig, sessions: SessionStore) -> Result<Self, IdentityError> {
        let api_key = std::env::var(&config.firebase_api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                IdentityError::Backend(format!(
                    "API key env var {} not found",
                    config.firebase_api_key_env
                ))
            })?;
        Ok(Self::new(config, api_key, sessions))
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    async fn post<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{}", self.endpoint, method);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Backend(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Backend(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let message = error_message(&text);
            debug!("Identity Toolkit {} failed ({}): {}", method, status, message);
            return Err(classify_error(&message));
        }

        serde_json::from_str(&text)
            .map_err(|e| IdentityError::Backend(format!("Failed to parse response: {}", e)))
    }

    /// Firebase uid behind a freshly issued ID token
    async fn user_of(&self, response: TokenResponse) -> Result<UserId, IdentityError> {
        if let Some(id) = response.local_id {
            return Ok(UserId::new(id));
        }

        let lookup: LookupResponse = self
            .post("lookup", json!({ "idToken": response.id_token }))
            .await
            .map_err(|e| match e {
                IdentityError::Backend(_) => e,
                _ => IdentityError::InvalidCredentials,
            })?;

        lookup
            .users
            .into_iter()
            .next()
            .map(|u| UserId::new(u.local_id))
            .ok_or(IdentityError::InvalidCredentials)
    }
}

/// Pull `error.message` out of an Identity Toolkit error body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Map an Identity Toolkit error code (e.g. `EMAIL_EXISTS`,
/// `WEAK_PASSWORD : Password should be ...`) to an identity error
fn classify_error(message: &str) -> IdentityError {
    let code = message
        .split(|c: char| c == ' ' || c == ':')
        .next()
        .unwrap_or_default();

    match code {
        "EMAIL_EXISTS" => IdentityError::EmailExists,
        "INVALID_LOGIN_CREDENTIALS" | "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "USER_DISABLED"
        | "INVALID_EMAIL" | "INVALID_CUSTOM_TOKEN" | "CREDENTIAL_MISMATCH" => {
            IdentityError::InvalidCredentials
        }
        "INVALID_ID_TOKEN" | "TOKEN_EXPIRED" | "USER_NOT_FOUND" => IdentityError::InvalidSession,
        _ => IdentityError::Backend(message.to_string()),
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, IdentityError> {
        let mut body = json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        if !display_name.is_empty() {
            body["displayName"] = json!(display_name);
        }

        let response: TokenResponse = self.post("signUp", body).await?;
        self.user_of(response).await
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionGrant, IdentityError> {
        let response: TokenResponse = self
            .post(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let user_id = self.user_of(response).await?;
        self.sessions.issue(&user_id).await
    }

    async fn verify_session(&self, token: &str) -> Result<UserId, IdentityError> {
        self.sessions.resolve(token).await
    }

    async fn revoke_session(&self, token: &str) -> Result<(), IdentityError> {
        self.sessions.revoke(token).await
    }

    async fn exchange_custom_token(&self, custom_token: &str) -> Result<SessionGrant, IdentityError> {
        let response: TokenResponse = self
            .post(
                "signInWithCustomToken",
                json!({ "token": custom_token, "returnSecureToken": true }),
            )
            .await?;
        let user_id = self.user_of(response).await?;
        self.sessions.issue(&user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::{Duration, Utc};

    #[test]
    fn test_classify_known_codes() {
        assert!(matches!(classify_error("EMAIL_EXISTS"), IdentityError::EmailExists));
        assert!(matches!(
            classify_error("INVALID_LOGIN_CREDENTIALS"),
            IdentityError::InvalidCredentials
        ));
        assert!(matches!(classify_error("EMAIL_NOT_FOUND"), IdentityError::InvalidCredentials));
        assert!(matches!(classify_error("INVALID_PASSWORD"), IdentityError::InvalidCredentials));
        assert!(matches!(classify_error("TOKEN_EXPIRED"), IdentityError::InvalidSession));
    }

    #[test]
    fn test_classify_code_with_detail() {
        match classify_error("WEAK_PASSWORD : Password should be at least 6 characters") {
            IdentityError::Backend(msg) => assert!(msg.starts_with("WEAK_PASSWORD")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify_error("INVALID_ID_TOKEN: bad signature"),
            IdentityError::InvalidSession
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":400,"message":"EMAIL_EXISTS","errors":[]}}"#;
        assert_eq!(error_message(body), "EMAIL_EXISTS");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }

    async fn provider(ttl: Duration) -> FirebaseIdentityProvider {
        let db = Database::open_in_memory().await.unwrap();
        FirebaseIdentityProvider::new(&AuthConfig::default(), "key", SessionStore::new(db, ttl))
    }

    #[tokio::test]
    async fn test_sessions_follow_configured_window() {
        let config = AuthConfig::default();
        let idp = provider(config.session_ttl()).await;
        let user = UserId::new("firebase-uid");

        let grant = idp.sessions().issue(&user).await.unwrap();
        assert!(grant.expires_at > Utc::now() + Duration::days(6));
        assert_eq!(idp.verify_session(&grant.token).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_logout_revokes_without_network() {
        let idp = provider(Duration::days(7)).await;
        let grant = idp.sessions().issue(&UserId::new("firebase-uid")).await.unwrap();

        idp.revoke_session(&grant.token).await.unwrap();
        assert!(matches!(
            idp.verify_session(&grant.token).await,
            Err(IdentityError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_never_reaches_provider() {
        let idp = provider(Duration::days(7)).await;
        assert!(matches!(
            idp.verify_session("raw-firebase-id-token").await,
            Err(IdentityError::InvalidSession)
        ));
    }
}
