//! Identity provider abstraction: accounts, credentials and sessions.

pub mod firebase;
pub mod local;
pub mod password;
pub mod session;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gaugyan_common::UserId;

pub use firebase::FirebaseIdentityProvider;
pub use local::LocalIdentityProvider;
pub use session::SessionStore;

/// Proof of an established session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionGrant {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum IdentityError {
    #[error("email already registered")]
    EmailExists,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("session is invalid or expired")]
    InvalidSession,

    #[error("{0} is not supported by this identity backend")]
    Unsupported(&'static str),

    #[error("identity backend error: {0}")]
    Backend(String),
}

impl From<crate::db::DbError> for IdentityError {
    fn from(err: crate::db::DbError) -> Self {
        IdentityError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account; does not establish a session
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, IdentityError>;

    async fn verify_credentials(&self, email: &str, password: &str)
        -> Result<SessionGrant, IdentityError>;

    /// Resolve a session token to its user
    async fn verify_session(&self, token: &str) -> Result<UserId, IdentityError>;

    /// Invalidate a session; unknown tokens are not an error
    async fn revoke_session(&self, token: &str) -> Result<(), IdentityError>;

    /// Exchange a provider-issued custom token for a session
    async fn exchange_custom_token(&self, _custom_token: &str) -> Result<SessionGrant, IdentityError> {
        Err(IdentityError::Unsupported("custom token login"))
    }
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
