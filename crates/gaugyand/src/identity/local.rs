//! SQLite-backed identity provider.

use super::password::{hash_password, verify_password};
use super::session::SessionStore;
use super::{IdentityError, IdentityProvider, SessionGrant};
use crate::db::Database;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use gaugyan_common::UserId;
use rusqlite::{params, OptionalExtension};
use tracing::info;

pub struct LocalIdentityProvider {
    db: Database,
    sessions: SessionStore,
    password_iterations: u32,
}

impl LocalIdentityProvider {
    pub fn new(db: Database, session_ttl: Duration, password_iterations: u32) -> Self {
        Self {
            sessions: SessionStore::new(db.clone(), session_ttl),
            db,
            password_iterations,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<UserId, IdentityError> {
        let iterations = self.password_iterations;
        let password = password.to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, iterations))
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;

        let user_id = uuid::Uuid::new_v4().to_string();
        let email = email.to_string();
        let display_name = display_name.to_string();
        let created_at = Utc::now().to_rfc3339();

        let id = user_id.clone();
        let created = self
            .db
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                    params![email],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO users (id, email, display_name, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![id, email, display_name, password_hash, created_at],
                )?;
                Ok(true)
            })
            .await?;

        if !created {
            return Err(IdentityError::EmailExists);
        }

        info!("Created local user {}", user_id);
        Ok(UserId::new(user_id))
    }

    async fn verify_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SessionGrant, IdentityError> {
        let lookup_email = email.to_string();
        let row: Option<(String, String)> = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, password_hash FROM users WHERE email = ?1",
                    params![lookup_email],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            })
            .await?;

        let Some((user_id, stored_hash)) = row else {
            return Err(IdentityError::InvalidCredentials);
        };

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .map_err(|e| IdentityError::Backend(e.to_string()))?;
        if !matches {
            return Err(IdentityError::InvalidCredentials);
        }

        self.sessions.issue(&UserId::new(user_id)).await
    }

    async fn verify_session(&self, token: &str) -> Result<UserId, IdentityError> {
        self.sessions.resolve(token).await
    }

    async fn revoke_session(&self, token: &str) -> Result<(), IdentityError> {
        self.sessions.revoke(token).await
    }
}
