//! Configuration management for gaugyand.
//!
//! Loads settings from `$GAUGYAN_CONFIG`, then /etc/gaugyan/config.toml, or
//! uses defaults. Secrets (API keys) are never read from the file, only from
//! the environment variables the file names.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::gemini::{DEFAULT_GEMINI_ENDPOINT, DEFAULT_GEMINI_MODEL};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/gaugyan/config.toml";

/// Env var overriding the config file location
pub const CONFIG_ENV: &str = "GAUGYAN_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Largest accepted request body (the photo travels base64-encoded)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Reverse proxies allowed to name the client in `X-Forwarded-For`
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

fn default_bind() -> String {
    "127.0.0.1:7870".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            trusted_proxies: Vec::new(),
        }
    }
}

/// Hosted vision model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model_name")]
    pub model: String,

    /// Name of the env var holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// HTTP timeout for one model call
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
}

fn default_model_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_model_name() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model_timeout() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_model_endpoint(),
            model: default_model_name(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_model_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthBackend {
    /// Accounts and sessions kept in the local SQLite database
    Local,
    /// Firebase Identity Toolkit REST API
    Firebase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_backend")]
    pub backend: AuthBackend,

    /// Session validity window, fixed at login
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: u32,

    /// PBKDF2-HMAC-SHA256 rounds for local password hashes
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,

    #[serde(default = "default_firebase_endpoint")]
    pub firebase_endpoint: String,

    #[serde(default = "default_firebase_api_key_env")]
    pub firebase_api_key_env: String,
}

fn default_auth_backend() -> AuthBackend {
    AuthBackend::Local
}

fn default_session_ttl_days() -> u32 {
    7
}

fn default_password_iterations() -> u32 {
    100_000
}

fn default_firebase_endpoint() -> String {
    "https://identitytoolkit.googleapis.com/v1".to_string()
}

fn default_firebase_api_key_env() -> String {
    "FIREBASE_API_KEY".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: default_auth_backend(),
            session_ttl_days: default_session_ttl_days(),
            password_iterations: default_password_iterations(),
            firebase_endpoint: default_firebase_endpoint(),
            firebase_api_key_env: default_firebase_api_key_env(),
        }
    }
}

impl AuthConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.session_ttl_days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/gaugyan/gaugyan.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Config {
    /// Load config from `$GAUGYAN_CONFIG`, the system path, or defaults.
    ///
    /// A file named by `$GAUGYAN_CONFIG` must load; a missing system file
    /// falls back to defaults but an unparseable one is an error.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_path(Path::new(&path))
                .with_context(|| format!("{} names an unusable config file", CONFIG_ENV));
        }
        Self::load_system(Path::new(CONFIG_PATH))
    }

    fn load_system(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config not found at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Self::load_from_path(path)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:7870");
        assert_eq!(config.server.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.model.model, "gemini-2.5-flash");
        assert_eq!(config.model.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.auth.backend, AuthBackend::Local);
        assert_eq!(config.auth.session_ttl(), chrono::Duration::days(7));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [auth]
            backend = "firebase"
            session_ttl_days = 3

            [storage]
            db_path = "/tmp/gg.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.backend, AuthBackend::Firebase);
        assert_eq!(config.auth.session_ttl_days, 3);
        assert_eq!(config.auth.firebase_api_key_env, "FIREBASE_API_KEY");
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/gg.db"));
        assert_eq!(config.server.bind, "127.0.0.1:7870");
    }

    #[test]
    fn test_trusted_proxies() {
        let config: Config = toml::from_str(
            r#"
            [server]
            trusted_proxies = ["10.0.0.2", "::1"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.server.trusted_proxies,
            vec!["10.0.0.2".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert!(Config::default().server.trusted_proxies.is_empty());
        assert!(toml::from_str::<Config>("[server]\ntrusted_proxies = [\"proxy\"]").is_err());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\nbackend = \"firebsae\"").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());
        assert!(Config::load_system(file.path()).is_err());
    }

    #[test]
    fn test_explicit_config_must_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage\ndb_path = \"/tmp/elsewhere.db\"").unwrap();

        std::env::set_var(CONFIG_ENV, file.path());
        let result = Config::load();
        std::env::remove_var(CONFIG_ENV);

        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains(CONFIG_ENV));
    }

    #[test]
    fn test_missing_system_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_system(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.auth.backend, AuthBackend::Local);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind = \"0.0.0.0:8080\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.model.timeout_secs, 120);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        assert!(Config::load_from_path(Path::new("/nonexistent/gaugyan.toml")).is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[auth]\nbackend = \"ldap\"");
        assert!(result.is_err());
    }
}
