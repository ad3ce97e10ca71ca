//! Daemon-issued sessions.
//!
//! Both identity backends hand out the same opaque tokens, stored only as
//! digests, with a validity window fixed at login.

use super::password::{generate_token, hash_token, mask_token};
use super::{IdentityError, SessionGrant};
use crate::db::Database;
use chrono::{Duration, Utc};
use gaugyan_common::UserId;
use rusqlite::{params, OptionalExtension};
use tracing::debug;

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for an already authenticated user
    pub async fn issue(&self, user_id: &UserId) -> Result<SessionGrant, IdentityError> {
        let token = generate_token();
        let token_hash = hash_token(&token);
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let uid = user_id.as_str().to_string();
        let created_at = now.to_rfc3339();
        let expires_ts = expires_at.timestamp();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![token_hash, uid, created_at, expires_ts],
                )
            })
            .await?;

        debug!("Session {} issued for user {}", mask_token(&token), user_id);
        Ok(SessionGrant {
            token,
            user_id: user_id.clone(),
            expires_at,
        })
    }

    /// Resolve a token; expired rows are removed on sight
    pub async fn resolve(&self, token: &str) -> Result<UserId, IdentityError> {
        let token_hash = hash_token(token);
        let now = Utc::now().timestamp();

        let row: Option<(String, i64)> = self
            .db
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
                        params![token_hash],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                if let Some((_, expires_at)) = &row {
                    if *expires_at <= now {
                        conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
                    }
                }
                Ok(row)
            })
            .await?;

        match row {
            Some((user_id, expires_at)) if expires_at > now => Ok(UserId::new(user_id)),
            Some(_) => {
                debug!("Session {} expired", mask_token(token));
                Err(IdentityError::InvalidSession)
            }
            None => Err(IdentityError::InvalidSession),
        }
    }

    /// Unknown tokens are not an error
    pub async fn revoke(&self, token: &str) -> Result<(), IdentityError> {
        let token_hash = hash_token(token);
        self.db
            .call(move |conn| conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash]))
            .await?;
        Ok(())
    }

    /// Delete sessions past their expiry; returns how many were removed
    pub async fn prune_expired(&self) -> Result<usize, IdentityError> {
        let now = Utc::now().timestamp();
        let removed = self
            .db
            .call(move |conn| conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now]))
            .await?;
        if removed > 0 {
            debug!("Pruned {} expired sessions", removed);
        }
        Ok(removed)
    }
}
