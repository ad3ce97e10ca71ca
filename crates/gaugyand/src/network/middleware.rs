//! Request middleware for body limits and auth rate limiting

use super::metrics::GauMetrics;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use gaugyan_common::{ErrorResponse, GauError};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Burst: 10 auth requests in 10 seconds
pub const RATE_LIMIT_BURST_REQUESTS: usize = 10;
pub const RATE_LIMIT_BURST_WINDOW: Duration = Duration::from_secs(10);

/// Sustained: 30 auth requests per minute
pub const RATE_LIMIT_SUSTAINED_REQUESTS: usize = 30;
pub const RATE_LIMIT_SUSTAINED_WINDOW: Duration = Duration::from_secs(60);

/// Per-peer rate limiter for the authentication endpoints
#[derive(Clone)]
pub struct RateLimiter {
    peer_requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    /// Socket peers whose `X-Forwarded-For` header is believed
    trusted_proxies: Arc<Vec<IpAddr>>,
    metrics: Option<Arc<GauMetrics>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            peer_requests: Arc::new(RwLock::new(HashMap::new())),
            trusted_proxies: Arc::new(Vec::new()),
            metrics: None,
        }
    }

    pub fn new_with_metrics(metrics: Arc<GauMetrics>) -> Self {
        Self {
            peer_requests: Arc::new(RwLock::new(HashMap::new())),
            trusted_proxies: Arc::new(Vec::new()),
            metrics: Some(metrics),
        }
    }

    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::new(proxies);
        self
    }

    /// Key a request is counted under
    pub fn peer_key(&self, request: &Request) -> String {
        extract_peer_addr(request, &self.trusted_proxies)
    }

    /// Check if peer is rate limited; records the request when it is not
    pub async fn check_peer_rate_limit(&self, peer_addr: &str) -> bool {
        let mut requests = self.peer_requests.write().await;
        let peer_reqs = requests.entry(peer_addr.to_string()).or_default();

        let now = Instant::now();

        let burst_count = peer_reqs
            .iter()
            .filter(|&&ts| now.duration_since(ts) < RATE_LIMIT_BURST_WINDOW)
            .count();

        if burst_count >= RATE_LIMIT_BURST_REQUESTS {
            warn!(
                "Auth burst rate limit exceeded for: {} ({}/{})",
                peer_addr, burst_count, RATE_LIMIT_BURST_REQUESTS
            );
            if let Some(ref metrics) = self.metrics {
                metrics.record_rate_limit_violation("auth_burst");
            }
            return false;
        }

        let sustained_count = peer_reqs
            .iter()
            .filter(|&&ts| now.duration_since(ts) < RATE_LIMIT_SUSTAINED_WINDOW)
            .count();

        if sustained_count >= RATE_LIMIT_SUSTAINED_REQUESTS {
            warn!(
                "Auth sustained rate limit exceeded for: {} ({}/{})",
                peer_addr, sustained_count, RATE_LIMIT_SUSTAINED_REQUESTS
            );
            if let Some(ref metrics) = self.metrics {
                metrics.record_rate_limit_violation("auth_sustained");
            }
            return false;
        }

        peer_reqs.retain(|&ts| now.duration_since(ts) < RATE_LIMIT_SUSTAINED_WINDOW);
        peer_reqs.push(now);
        true
    }

    pub async fn get_peer_request_count(&self, peer_addr: &str) -> usize {
        let requests = self.peer_requests.read().await;
        requests.get(peer_addr).map(|v| v.len()).unwrap_or(0)
    }

    /// Drop peers with no requests inside the sustained window
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.peer_requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&ts| now.duration_since(ts) < RATE_LIMIT_SUSTAINED_WINDOW);
            !timestamps.is_empty()
        });
        debug!("Rate limiter cleanup: {} active peers", requests.len());
    }
}

/// Error envelope for rejections raised before a handler runs
pub fn rejection(status: StatusCode, err: &GauError) -> Response {
    (status, Json(ErrorResponse::from(err))).into_response()
}

/// Body size limit middleware
///
/// Rejects requests whose Content-Length exceeds the configured maximum;
/// streamed bodies are capped by `RequestBodyLimitLayer`.
pub async fn body_size_limit(State(max_body_bytes): State<usize>, request: Request, next: Next) -> Response {
    let declared = request
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());

    if let Some(length) = declared {
        if length > max_body_bytes {
            warn!("Request body too large: {} bytes (max: {})", length, max_body_bytes);
            return rejection(StatusCode::PAYLOAD_TOO_LARGE, &GauError::PayloadTooLarge);
        }
    }

    next.run(request).await
}

/// Rate limit middleware for `/v1/auth/*`
pub async fn rate_limit_middleware(
    State(rate_limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer_addr = rate_limiter.peer_key(&request);

    if !rate_limiter.check_peer_rate_limit(&peer_addr).await {
        return rejection(StatusCode::TOO_MANY_REQUESTS, &GauError::RateLimited);
    }

    debug!(
        "Rate limit OK for {}: {}/{} requests",
        peer_addr,
        rate_limiter.get_peer_request_count(&peer_addr).await,
        RATE_LIMIT_SUSTAINED_REQUESTS
    );
    next.run(request).await
}

/// Peer address: the socket peer, or the client named in `X-Forwarded-For`
/// when the socket peer is a trusted proxy
pub fn extract_peer_addr(request: &Request, trusted_proxies: &[IpAddr]) -> String {
    let Some(socket_ip) = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
    else {
        return "unknown".to_string();
    };

    if trusted_proxies.contains(&socket_ip) {
        if let Some(client) = forwarded_client(request.headers(), trusted_proxies) {
            return client.to_string();
        }
    }
    socket_ip.to_string()
}

/// Nearest `X-Forwarded-For` hop that is not itself a trusted proxy
fn forwarded_client(headers: &HeaderMap, trusted_proxies: &[IpAddr]) -> Option<IpAddr> {
    let value = headers.get("x-forwarded-for")?.to_str().ok()?;
    let hops: Vec<IpAddr> = value
        .split(',')
        .filter_map(|hop| hop.trim().parse().ok())
        .collect();

    hops.iter()
        .rev()
        .find(|ip| !trusted_proxies.contains(ip))
        .or_else(|| hops.first())
        .copied()
}
