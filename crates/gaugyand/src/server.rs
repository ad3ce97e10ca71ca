//! HTTP server for gaugyand

use crate::config::ServerConfig;
use crate::gate::Gate;
use crate::network::middleware::body_size_limit;
use crate::network::{GauMetrics, RateLimiter};
use crate::routes;
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// How often idle rate-limiter entries are dropped
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Application state shared across handlers
pub struct AppState {
    pub gate: Arc<Gate>,
    pub metrics: Arc<GauMetrics>,
    pub rate_limiter: RateLimiter,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(gate: Arc<Gate>, metrics: Arc<GauMetrics>) -> Self {
        Self {
            gate,
            rate_limiter: RateLimiter::new_with_metrics(metrics.clone()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Honour `X-Forwarded-For` only from these socket peers
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.rate_limiter = self.rate_limiter.with_trusted_proxies(proxies);
        self
    }
}

/// Assemble all routes and middleware
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let auth = routes::auth_routes(&state);
    let state = Arc::new(state);

    Router::new()
        .merge(auth)
        .merge(routes::analysis_routes())
        .merge(routes::history_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(middleware::from_fn_with_state(max_body_bytes, body_size_limit))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until Ctrl-C
pub async fn run(state: AppState, config: &ServerConfig) -> Result<()> {
    let limiter = state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            ticker.tick().await;
            limiter.cleanup().await;
        }
    });

    let app = build_router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", config.bind);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gracefully");
        })
        .await?;
    Ok(())
}
