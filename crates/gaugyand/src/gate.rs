//! Session/history gate.
//!
//! Every caller-facing operation goes through here: session resolution,
//! the two-step analysis pipeline, and the per-user history. Collaborator
//! errors are mapped to `GauError` at this boundary.

use crate::flows;
use crate::history::{HistoryStore, StoreError};
use crate::identity::{normalize_email, IdentityError, IdentityProvider, SessionGrant};
use crate::model::{Flow, VisionModel};
use crate::network::GauMetrics;
use chrono::Utc;
use gaugyan_common::protocol::RelevantTraitsRequest;
use gaugyan_common::{AnalysisRecord, CombinedResult, GauError, ImagePayload, UserId};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(UserId),
}

pub struct Gate {
    model: Arc<dyn VisionModel>,
    identity: Arc<dyn IdentityProvider>,
    history: Arc<dyn HistoryStore>,
    metrics: Option<Arc<GauMetrics>>,
}

impl Gate {
    pub fn new(
        model: Arc<dyn VisionModel>,
        identity: Arc<dyn IdentityProvider>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            model,
            identity,
            history,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GauMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve a presented session token. Unknown, revoked and expired
    /// tokens resolve to `Unauthenticated`.
    pub async fn session_state(&self, token: Option<&str>) -> Result<SessionState, GauError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(SessionState::Unauthenticated);
        };

        match self.identity.verify_session(token).await {
            Ok(user_id) => Ok(SessionState::Authenticated(user_id)),
            Err(IdentityError::InvalidSession) | Err(IdentityError::InvalidCredentials) => {
                Ok(SessionState::Unauthenticated)
            }
            Err(e) => {
                error!("Session lookup failed: {}", e);
                Err(GauError::UpstreamFailure(e.to_string()))
            }
        }
    }

    /// Resolve the caller or fail with the operation's auth error
    async fn require_user(&self, token: Option<&str>, denied: GauError) -> Result<UserId, GauError> {
        match self.session_state(token).await? {
            SessionState::Authenticated(user_id) => Ok(user_id),
            SessionState::Unauthenticated => Err(denied),
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserId, GauError> {
        let result = self.register_inner(name, email, password).await;
        self.record_auth("register", &result);
        result
    }

    async fn register_inner(&self, name: &str, email: &str, password: &str) -> Result<UserId, GauError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(GauError::InvalidInput("a valid email address is required".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(GauError::InvalidInput(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user_id = self
            .identity
            .create_user(&email, password, name.trim())
            .await
            .map_err(identity_failure)?;

        info!("Registered user {}", user_id);
        Ok(user_id)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<SessionGrant, GauError> {
        let email = normalize_email(email);
        let result = if email.is_empty() || password.is_empty() {
            Err(GauError::InvalidInput("email and password are required".to_string()))
        } else {
            self.identity
                .verify_credentials(&email, password)
                .await
                .map_err(identity_failure)
        };

        self.record_auth("login", &result);
        if let Ok(grant) = &result {
            info!("User {} logged in", grant.user_id);
        }
        result
    }

    /// Token-relay login: exchange a provider-issued custom token
    pub async fn login_with_custom_token(&self, custom_token: &str) -> Result<SessionGrant, GauError> {
        let result = if custom_token.trim().is_empty() {
            Err(GauError::InvalidInput("customToken is required".to_string()))
        } else {
            self.identity
                .exchange_custom_token(custom_token.trim())
                .await
                .map_err(identity_failure)
        };

        self.record_auth("token", &result);
        if let Ok(grant) = &result {
            info!("User {} logged in with custom token", grant.user_id);
        }
        result
    }

    /// Revoke the session. Logging out without a valid session succeeds.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), GauError> {
        let result = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => self
                .identity
                .revoke_session(token)
                .await
                .map_err(identity_failure),
            None => Ok(()),
        };
        self.record_auth("logout", &result);
        result
    }

    /// Extract traits, score them, then persist exactly one record.
    pub async fn analyze(&self, token: Option<&str>, image: &ImagePayload) -> Result<CombinedResult, GauError> {
        let result = self.analyze_inner(token, image).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_analysis(outcome(&result));
        }
        result
    }

    async fn analyze_inner(&self, token: Option<&str>, image: &ImagePayload) -> Result<CombinedResult, GauError> {
        let user_id = self.require_user(token, GauError::Unauthorized).await?;
        debug!(
            "Analysis for user {}: {} ({} bytes)",
            user_id,
            image.media_type(),
            image.bytes().len()
        );

        let traits = self
            .timed(Flow::ExtractTraits, flows::extract_traits(self.model.as_ref(), image))
            .await?;
        let score = self
            .timed(
                Flow::GenerateScore,
                flows::generate_score(self.model.as_ref(), &traits, image),
            )
            .await?;

        let result = CombinedResult { traits, score };
        let record = AnalysisRecord::new(
            uuid::Uuid::new_v4().to_string(),
            image.reference(),
            Utc::now(),
            result.clone(),
        );

        self.history
            .append(&user_id, &record)
            .await
            .map_err(store_failure)?;

        info!(
            "Analysis {} stored for user {} (ATC score {})",
            record.id, user_id, result.score.atc_score
        );
        Ok(result)
    }

    /// The caller's records, newest first
    pub async fn list_history(&self, token: Option<&str>) -> Result<Vec<AnalysisRecord>, GauError> {
        let user_id = self.require_user(token, GauError::NotAuthenticated).await?;
        let records = self.history.list_all(&user_id).await.map_err(store_failure)?;
        debug!("Listed {} history records for user {}", records.len(), user_id);
        Ok(records)
    }

    /// Delete all of the caller's records; returns how many were removed
    pub async fn clear_history(&self, token: Option<&str>) -> Result<usize, GauError> {
        let user_id = self.require_user(token, GauError::NotAuthenticated).await?;
        self.history.clear(&user_id).await.map_err(store_failure)
    }

    pub async fn suggest_relevant_traits(
        &self,
        token: Option<&str>,
        request: &RelevantTraitsRequest,
    ) -> Result<Vec<String>, GauError> {
        let user_id = self.require_user(token, GauError::Unauthorized).await?;
        debug!("Relevant-traits request from user {}", user_id);
        self.timed(
            Flow::RelevantTraits,
            flows::suggest_relevant_traits(self.model.as_ref(), request),
        )
        .await
    }

    async fn timed<T>(&self, flow: Flow, fut: impl Future<Output = Result<T, GauError>>) -> Result<T, GauError> {
        let started = Instant::now();
        let result = fut.await;
        if let Some(metrics) = &self.metrics {
            metrics.record_model_latency(flow.as_str(), started.elapsed().as_secs_f64());
        }
        result
    }

    fn record_auth<T>(&self, event: &str, result: &Result<T, GauError>) {
        if let Some(metrics) = &self.metrics {
            metrics.record_auth_event(event, outcome(result));
        }
    }
}

fn outcome<T>(result: &Result<T, GauError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.code(),
    }
}

fn identity_failure(err: IdentityError) -> GauError {
    match err {
        IdentityError::EmailExists => GauError::EmailAlreadyRegistered,
        IdentityError::InvalidCredentials | IdentityError::Unsupported(_) => GauError::InvalidCredentials,
        IdentityError::InvalidSession => GauError::NotAuthenticated,
        IdentityError::Backend(msg) => {
            warn!("Identity backend failure: {}", msg);
            GauError::UpstreamFailure(msg)
        }
    }
}

fn store_failure(err: StoreError) -> GauError {
    error!("History store failure: {}", err);
    GauError::UpstreamFailure(format!("history store: {}", err))
}
