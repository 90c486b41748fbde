#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use serde_json::Value;
use std::sync::Arc;
use tollgate::{ServerConfig, clock::ManualClock, create_app};
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

/// Fixed start instant for tests driving a manual clock.
pub const NOW: u64 = 1_700_000_000;

/// Build a config on a manual clock with every other setting at its default.
pub fn test_config() -> (ServerConfig, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at_secs(NOW));
    let mut config = ServerConfig::new(TEST_SECRET);
    config.clock = clock.clone();
    (config, clock)
}

pub fn test_app() -> (Router, Arc<ManualClock>) {
    let (config, clock) = test_config();
    (create_app(&config), clock)
}

/// Send a request and return status plus parsed JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_form(app: &Router, uri: &str, form: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap(),
    )
    .await
}

/// Request a token for `user`/`password` and return the whole response.
pub async fn request_token(app: &Router, user: &str, password: &str) -> (StatusCode, Value) {
    post_form(
        app,
        "/api/token",
        &format!("user_name={}&password={}", user, password),
    )
    .await
}

/// Issue a token for the default account.
pub async fn issue(app: &Router) -> String {
    let (status, body) = request_token(app, "jason", "123").await;
    assert_eq!(status, StatusCode::OK, "issue failed: {}", body);
    body["result"]["access_token"].as_str().unwrap().to_string()
}

/// GET `path` presenting `token` in the default parameter.
pub async fn get_with_token(app: &Router, path: &str, token: &str) -> (StatusCode, Value) {
    get(app, &format!("{}?access_token={}", path, token)).await
}

/// Check the envelope fields of an error response.
pub fn assert_envelope(status: StatusCode, body: &Value, expected: StatusCode, code: u64) {
    assert_eq!(status, expected, "body: {}", body);
    assert_eq!(body["status"].as_u64(), Some(expected.as_u16() as u64));
    assert_eq!(body["code"].as_u64(), Some(code), "body: {}", body);
    assert!(body.get("result").is_none());
}
