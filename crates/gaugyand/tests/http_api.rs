//! HTTP API tests: the router driven with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::extract::ConnectInfo;
use axum::Router;
use chrono::Duration;
use gaugyan_common::{ErrorResponse, GauError, ImagePayload};
use gaugyand::db::Database;
use gaugyand::gate::Gate;
use gaugyand::history::SqliteHistoryStore;
use gaugyand::identity::LocalIdentityProvider;
use gaugyand::model::FakeVisionModel;
use gaugyand::network::middleware::RATE_LIMIT_BURST_REQUESTS;
use gaugyand::network::GauMetrics;
use gaugyand::server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower::ServiceExt;

const MAX_BODY: usize = 64 * 1024;

async fn app_with(model: FakeVisionModel) -> Router {
    app_behind(model, Vec::new()).await
}

async fn app_behind(model: FakeVisionModel, trusted_proxies: Vec<IpAddr>) -> Router {
    let db = Database::open_in_memory().await.unwrap();
    let metrics = Arc::new(GauMetrics::new().unwrap());
    let gate = Gate::new(
        Arc::new(model),
        Arc::new(LocalIdentityProvider::new(db.clone(), Duration::days(7), 10)),
        Arc::new(SqliteHistoryStore::new(db)),
    )
    .with_metrics(metrics.clone());
    let state = AppState::new(Arc::new(gate), metrics).with_trusted_proxies(trusted_proxies);
    build_router(state, MAX_BODY)
}

async fn app() -> Router {
    app_with(FakeVisionModel::new(vec![
        Ok(json!({
            "bodyLength": 150.0,
            "chestWidth": 46.0,
            "heightAtWithers": 129.5,
            "rumpAngle": 9.0,
            "udderShape": "round"
        })),
        Ok(json!({"atcScore": 64.0, "salientTraits": "Moderate frame."})),
    ]))
    .await
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_code(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let err: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
    err.error.code
}

fn image_uri() -> String {
    ImagePayload::new("image/png", vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a])
        .unwrap()
        .to_data_uri()
}

/// Register and log in; returns the session token
async fn session(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/auth/register",
            json!({"name": "Test", "email": email, "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(post_json("/v1/auth/login", json!({"email": email, "password": "secret1"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let response = app().await.oneshot(get("/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], gaugyan_common::VERSION);
    assert!(body["uptimeSeconds"].is_u64());
}

#[tokio::test]
async fn test_register_conflict_is_409() {
    let app = app().await;
    session(&app, "alice@example.com").await;

    let response = app
        .oneshot(post_json(
            "/v1/auth/register",
            json!({"email": "alice@example.com", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(error_code(response).await, "email_already_registered");
}

#[tokio::test]
async fn test_login_sets_session_cookie() {
    let app = app().await;
    session(&app, "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/auth/login",
            json!({"email": "alice@example.com", "password": "secret1"}),
            None,
        ))
        .await
        .unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let body = json_body(response).await;
    let token = body["token"].as_str().unwrap();
    assert!(cookie.starts_with(&format!("session={};", token)));

    // The cookie alone authenticates
    let request = Request::builder()
        .uri("/v1/history")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_password_is_401() {
    let app = app().await;
    session(&app, "alice@example.com").await;

    let response = app
        .oneshot(post_json(
            "/v1/auth/login",
            json!({"email": "alice@example.com", "password": "wrongpass"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(error_code(response).await, "invalid_credentials");
}

#[tokio::test]
async fn test_analyze_then_history() {
    let app = app().await;
    let token = session(&app, "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(post_json("/v1/analyze", json!({"image": image_uri()}), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["bodyLength"], 150.0);
    assert_eq!(result["udderShape"], "round");
    assert_eq!(result["atcScore"], 64.0);

    let response = app
        .clone()
        .oneshot(get("/v1/history", Some(&token)))
        .await
        .unwrap();
    let history = json_body(response).await;
    let records = history.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["atcScore"], 64.0);
    assert!(records[0]["image"].as_str().unwrap().starts_with("image/png;sha256:"));
    assert!(records[0]["id"].is_string());
    assert!(records[0]["timestamp"].is_string());

    let request = Request::builder()
        .method("DELETE")
        .uri("/v1/history")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(json_body(response).await["cleared"], 1);
}

#[tokio::test]
async fn test_analyze_without_session_is_401() {
    let response = app()
        .await
        .oneshot(post_json("/v1/analyze", json!({"image": image_uri()}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "unauthorized");
}

#[tokio::test]
async fn test_bad_image_checks_session_first() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post_json("/v1/analyze", json!({"image": "not a data uri"}), None))
        .await
        .unwrap();
    assert_eq!(error_code(response).await, "unauthorized");

    let token = session(&app, "alice@example.com").await;
    let response = app
        .oneshot(post_json(
            "/v1/analyze",
            json!({"image": "data:text/plain;base64,aGVsbG8="}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "invalid_input");
}

#[tokio::test]
async fn test_invalid_model_output_is_502() {
    let app = app_with(FakeVisionModel::always_valid(json!({"nothing": true}))).await;
    let token = session(&app, "alice@example.com").await;

    let response = app
        .oneshot(post_json("/v1/analyze", json!({"image": image_uri()}), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_code(response).await, "model_response_invalid");
}

#[tokio::test]
async fn test_history_without_session_is_401() {
    let response = app().await.oneshot(get("/v1/history", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "not_authenticated");
}

#[tokio::test]
async fn test_logout_clears_cookie_and_session() {
    let app = app().await;
    let token = session(&app, "alice@example.com").await;

    let response = app
        .clone()
        .oneshot(post_json("/v1/auth/logout", json!({}), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.contains("Max-Age=0"));

    let response = app.oneshot(get("/v1/history", Some(&token))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_relevant_traits_route() {
    let app = app_with(FakeVisionModel::always_valid(json!({
        "relevantTraits": ["Rump Angle: drives calving ease"]
    })))
    .await;
    let token = session(&app, "alice@example.com").await;

    let body = json!({"animalType": "buffalo", "atcScore": 72.0, "traitData": {"rumpAngle": 12.0}});
    let response = app
        .clone()
        .oneshot(post_json("/v1/traits/relevant", body.clone(), Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await["relevantTraits"][0],
        "Rump Angle: drives calving ease"
    );

    let response = app
        .oneshot(post_json(
            "/v1/traits/relevant",
            json!({"animalType": "buffalo", "atcScore": 72.0, "traitData": {}}),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(response).await, "invalid_input");
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let body = json!({"image": "A".repeat(MAX_BODY + 1)}).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/v1/analyze")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap();
    let response = app().await.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error_code(response).await, "payload_too_large");
}

/// Login attempt arriving from `peer`, optionally naming a forwarded client
fn login_from(peer: [u8; 4], forwarded: Option<String>) -> Request<Body> {
    let mut request = post_json(
        "/v1/auth/login",
        json!({"email": "x@example.com", "password": "secret1"}),
        None,
    );
    if let Some(forwarded) = forwarded {
        request
            .headers_mut()
            .insert("x-forwarded-for", forwarded.parse().unwrap());
    }
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

#[tokio::test]
async fn test_auth_routes_are_rate_limited() {
    let app = app().await;

    for _ in 0..RATE_LIMIT_BURST_REQUESTS {
        let response = app.clone().oneshot(login_from([198, 51, 100, 4], None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = app.clone().oneshot(login_from([198, 51, 100, 4], None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "rate_limited");
    assert_eq!(
        body["error"]["message"],
        "Too many authentication attempts. Try again shortly."
    );

    // Another peer has its own budget
    let response = app.clone().oneshot(login_from([198, 51, 100, 5], None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Non-auth routes are unaffected
    let response = app.clone().oneshot(get("/v1/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/metrics", None)).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("gaugyan_rate_limit_violations_total{scope=\"auth_burst\"} 1"));
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_the_limit() {
    let app = app().await;

    let mut allowed = 0;
    for i in 0..100 {
        let request = login_from([203, 0, 113, 5], Some(format!("192.0.2.{}", i)));
        let response = app.clone().oneshot(request).await.unwrap();
        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            allowed += 1;
        }
    }
    assert_eq!(allowed, RATE_LIMIT_BURST_REQUESTS);
}

#[tokio::test]
async fn test_trusted_proxy_forwards_client_address() {
    let proxy: IpAddr = "10.0.0.2".parse().unwrap();
    let app = app_behind(FakeVisionModel::new(Vec::new()), vec![proxy]).await;

    for _ in 0..RATE_LIMIT_BURST_REQUESTS {
        let request = login_from([10, 0, 0, 2], Some("192.0.2.10".to_string()));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
    let request = login_from([10, 0, 0, 2], Some("192.0.2.10".to_string()));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different client behind the same proxy is counted separately
    let request = login_from([10, 0, 0, 2], Some("192.0.2.11".to_string()));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_error_message_has_no_prefix() {
    let app = app().await;
    let response = app
        .oneshot(post_json(
            "/v1/auth/register",
            json!({"name": "Alice", "email": "alice@example.com", "password": "abc"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: ErrorResponse = serde_json::from_value(json_body(response).await).unwrap();
    assert_eq!(body.error.code, "invalid_input");
    assert_eq!(body.error.message, "password must be at least 6 characters");
    assert_eq!(
        GauError::from_wire(&body.error).to_string(),
        "Invalid input: password must be at least 6 characters"
    );
}
