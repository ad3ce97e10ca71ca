//! Persisted login session for gaugyanctl.
//!
//! Stored as JSON in `<config dir>/gaugyan/session.json`, readable only by
//! the owner.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use gaugyan_common::UserId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub server: String,
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/gaugyan/session.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir().context("Cannot determine the user config directory")?;
        Ok(Self::new(dir.join("gaugyan").join("session.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session for `server`, if present and not expired
    pub fn load(&self, server: &str) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let session: StoredSession = match serde_json::from_str(&content) {
            Ok(session) => session,
            // A damaged file is as good as no session
            Err(_) => return Ok(None),
        };

        if session.is_expired() || session.server != server {
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(session)?;
        write_private(&self.path, content.as_bytes())
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Remove the stored session; a missing file is not an error
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // Tighten files created by older versions
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}
