//! Gau Gyan Daemon - cattle photo analysis service
//!
//! Extracts body traits from a photo with a hosted vision model, derives an
//! ATC score, and keeps a per-user history behind session authentication.

use anyhow::{Context, Result};
use gaugyand::config::{AuthBackend, Config};
use gaugyand::db::Database;
use gaugyand::gate::Gate;
use gaugyand::history::SqliteHistoryStore;
use gaugyand::identity::{FirebaseIdentityProvider, IdentityProvider, LocalIdentityProvider, SessionStore};
use gaugyand::model::GeminiClient;
use gaugyand::network::GauMetrics;
use gaugyand::server::{self, AppState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often expired sessions are purged
const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gaugyand=info,tower_http=info")),
        )
        .init();

    info!("Gau Gyan Daemon v{} starting", gaugyan_common::VERSION);

    let config = Config::load()?;

    let db = Database::open(&config.storage.db_path)
        .await
        .context("Failed to open database")?;

    let identity: Arc<dyn IdentityProvider> = match config.auth.backend {
        AuthBackend::Local => {
            let local = LocalIdentityProvider::new(
                db.clone(),
                config.auth.session_ttl(),
                config.auth.password_iterations,
            );
            spawn_session_pruner(local.sessions().clone());
            info!("Using local identity backend");
            Arc::new(local)
        }
        AuthBackend::Firebase => {
            let sessions = SessionStore::new(db.clone(), config.auth.session_ttl());
            let firebase = FirebaseIdentityProvider::from_env(&config.auth, sessions)
                .context("Failed to configure Firebase identity backend")?;
            spawn_session_pruner(firebase.sessions().clone());
            info!("Using Firebase identity backend");
            Arc::new(firebase)
        }
    };
    info!("Sessions last {} days", config.auth.session_ttl_days);

    let model = GeminiClient::from_env(&config.model).context("Failed to configure vision model")?;
    info!("Vision model: {}", model.model());

    let metrics = Arc::new(GauMetrics::new().context("Failed to register metrics")?);
    let gate = Gate::new(
        Arc::new(model),
        identity,
        Arc::new(SqliteHistoryStore::new(db)),
    )
    .with_metrics(metrics.clone());

    let state = AppState::new(Arc::new(gate), metrics)
        .with_trusted_proxies(config.server.trusted_proxies.clone());
    if !config.server.trusted_proxies.is_empty() {
        info!("Trusting X-Forwarded-For from {:?}", config.server.trusted_proxies);
    }
    server::run(state, &config.server).await
}

fn spawn_session_pruner(sessions: SessionStore) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = sessions.prune_expired().await {
                warn!("Session pruning failed: {}", e);
            }
        }
    });
}
