//! HTTP client for communicating with gaugyand.

use crate::errors::ClientError;
use gaugyan_common::protocol::{
    AnalyzeRequest, ClearHistoryResponse, HealthResponse, LoginRequest, LoginResponse, RegisterRequest,
    RegisterResponse, RelevantTraitsRequest, RelevantTraitsResponse, TokenLoginRequest,
};
use gaugyan_common::{AnalysisRecord, CombinedResult, ErrorResponse, GauError, ImagePayload};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Analysis runs two model calls back to back
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Client for the gaugyand HTTP API
pub struct GauClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GauClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Unavailable {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<String, ClientError> {
        let response = builder.send().await.map_err(|e| ClientError::Unavailable {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(decode_error(status, &body));
        }
        Ok(body)
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let body = self.send(builder).await?;
        serde_json::from_str(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ClientError> {
        self.call(self.request(Method::POST, path).json(body)).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.call(self.request(Method::GET, "/v1/health")).await
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<RegisterResponse, ClientError> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/v1/auth/register", &body).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("/v1/auth/login", &body).await
    }

    pub async fn login_with_token(&self, custom_token: &str) -> Result<LoginResponse, ClientError> {
        let body = TokenLoginRequest {
            custom_token: custom_token.to_string(),
        };
        self.post("/v1/auth/token", &body).await
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        self.send(self.request(Method::POST, "/v1/auth/logout")).await?;
        Ok(())
    }

    pub async fn analyze(&self, image: &ImagePayload) -> Result<CombinedResult, ClientError> {
        let body = AnalyzeRequest {
            image: image.to_data_uri(),
        };
        self.post("/v1/analyze", &body).await
    }

    pub async fn history(&self) -> Result<Vec<AnalysisRecord>, ClientError> {
        self.call(self.request(Method::GET, "/v1/history")).await
    }

    pub async fn clear_history(&self) -> Result<ClearHistoryResponse, ClientError> {
        self.call(self.request(Method::DELETE, "/v1/history")).await
    }

    pub async fn relevant_traits(&self, request: &RelevantTraitsRequest) -> Result<RelevantTraitsResponse, ClientError> {
        self.post("/v1/traits/relevant", request).await
    }
}

/// Turn a non-2xx response into a client error
fn decode_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(envelope) => ClientError::Api(GauError::from_wire(&envelope.error)),
        Err(_) if status.is_server_error() => {
            ClientError::Api(GauError::UpstreamFailure(format!("HTTP {}", status)))
        }
        Err(_) => ClientError::InvalidResponse(format!("HTTP {}: {}", status, body.trim())),
    }
}
