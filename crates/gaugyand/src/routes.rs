//! API routes for gaugyand

use crate::network::middleware::{rate_limit_middleware, rejection};
use crate::server::AppState;
use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use gaugyan_common::protocol::{
    AnalyzeRequest, ClearHistoryResponse, HealthResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, RelevantTraitsRequest, RelevantTraitsResponse, TokenLoginRequest,
};
use gaugyan_common::{AnalysisRecord, CombinedResult, GauError, ImagePayload, SESSION_COOKIE};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

use crate::gate::SessionState;
use crate::identity::SessionGrant;

type AppStateArc = Arc<AppState>;

// ============================================================================
// Errors
// ============================================================================

/// Handler error: the taxonomy error sent back to the caller
#[derive(Debug)]
pub struct ApiError(pub GauError);

impl From<GauError> for ApiError {
    fn from(err: GauError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError(GauError::PayloadTooLarge)
        } else {
            ApiError(GauError::InvalidInput(rejection.body_text()))
        }
    }
}

/// HTTP status for each taxonomy error
pub fn status_for(err: &GauError) -> StatusCode {
    match err {
        GauError::Unauthorized | GauError::NotAuthenticated | GauError::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        GauError::EmailAlreadyRegistered => StatusCode::CONFLICT,
        GauError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GauError::ModelResponseInvalid(_) | GauError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
        GauError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        GauError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        rejection(status_for(&self.0), &self.0)
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Session extraction
// ============================================================================

/// Session token from `Authorization: Bearer` or the session cookie
#[derive(Debug, Clone, Default)]
pub struct SessionToken(pub Option<String>);

impl SessionToken {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(token_from_headers(&parts.headers)))
    }
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn session_cookie(grant: &SessionGrant) -> String {
    let max_age = (grant.expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite=Lax",
        SESSION_COOKIE, grant.token, max_age
    )
}

fn cleared_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0; SameSite=Lax", SESSION_COOKIE)
}

fn with_cookie(cookie: String) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}

fn login_response(grant: SessionGrant) -> (HeaderMap, Json<LoginResponse>) {
    let headers = with_cookie(session_cookie(&grant));
    (
        headers,
        Json(LoginResponse {
            token: grant.token,
            user_id: grant.user_id,
            expires_at: grant.expires_at,
        }),
    )
}

// ============================================================================
// Auth Routes
// ============================================================================

pub fn auth_routes(state: &AppState) -> Router<AppStateArc> {
    Router::new()
        .route("/v1/auth/register", post(register))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/token", post(login_with_token))
        .route("/v1/auth/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
}

async fn register(
    State(state): State<AppStateArc>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(req) = payload?;
    let user_id = state.gate.register(&req.name, &req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

async fn login(
    State(state): State<AppStateArc>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<LoginResponse>)> {
    let Json(req) = payload?;
    let grant = state.gate.login(&req.email, &req.password).await?;
    Ok(login_response(grant))
}

async fn login_with_token(
    State(state): State<AppStateArc>,
    payload: Result<Json<TokenLoginRequest>, JsonRejection>,
) -> ApiResult<(HeaderMap, Json<LoginResponse>)> {
    let Json(req) = payload?;
    let grant = state.gate.login_with_custom_token(&req.custom_token).await?;
    Ok(login_response(grant))
}

async fn logout(State(state): State<AppStateArc>, token: SessionToken) -> ApiResult<(StatusCode, HeaderMap)> {
    state.gate.logout(token.as_deref()).await?;
    Ok((StatusCode::NO_CONTENT, with_cookie(cleared_cookie())))
}

// ============================================================================
// Analysis Routes
// ============================================================================

pub fn analysis_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/analyze", post(analyze))
        .route("/v1/traits/relevant", post(relevant_traits))
}

async fn analyze(
    State(state): State<AppStateArc>,
    token: SessionToken,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<CombinedResult>> {
    let Json(req) = payload?;

    let image = match ImagePayload::from_data_uri(&req.image) {
        Ok(image) => image,
        Err(e) => {
            // Unauthenticated callers learn nothing about their payload
            if state.gate.session_state(token.as_deref()).await? == SessionState::Unauthenticated {
                return Err(GauError::Unauthorized.into());
            }
            warn!("Rejected analysis image: {}", e);
            return Err(GauError::InvalidInput(e.to_string()).into());
        }
    };

    let result = state.gate.analyze(token.as_deref(), &image).await?;
    Ok(Json(result))
}

async fn relevant_traits(
    State(state): State<AppStateArc>,
    token: SessionToken,
    payload: Result<Json<RelevantTraitsRequest>, JsonRejection>,
) -> ApiResult<Json<RelevantTraitsResponse>> {
    let Json(req) = payload?;
    let relevant_traits = state
        .gate
        .suggest_relevant_traits(token.as_deref(), &req)
        .await?;
    Ok(Json(RelevantTraitsResponse { relevant_traits }))
}

// ============================================================================
// History Routes
// ============================================================================

pub fn history_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/history", get(list_history).delete(clear_history))
}

async fn list_history(
    State(state): State<AppStateArc>,
    token: SessionToken,
) -> ApiResult<Json<Vec<AnalysisRecord>>> {
    let records = state.gate.list_history(token.as_deref()).await?;
    Ok(Json(records))
}

async fn clear_history(
    State(state): State<AppStateArc>,
    token: SessionToken,
) -> ApiResult<Json<ClearHistoryResponse>> {
    let cleared = state.gate.clear_history(token.as_deref()).await?;
    info!("History cleared ({} records)", cleared);
    Ok(Json(ClearHistoryResponse { cleared }))
}

// ============================================================================
// Health & Metrics Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: gaugyan_common::VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics(State(state): State<AppStateArc>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export(),
    )
}
