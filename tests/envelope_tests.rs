//! Tests for the uniform response envelope and request sanitizing.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use std::sync::Arc;
use tollgate::{
    auth::RoleSet,
    create_app,
    credentials::CredentialStore,
    error::CredentialError,
};

#[tokio::test]
async fn test_unknown_public_route_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = get(&app, "/static/missing.js").await;
    assert_envelope(status, &body, StatusCode::NOT_FOUND, 2002);
    assert_eq!(body["message"], "Not Found");
}

#[tokio::test]
async fn test_unknown_protected_route_checks_token_first() {
    let (app, _) = test_app();

    let (status, body) = get(&app, "/api/nope").await;
    assert_envelope(status, &body, StatusCode::UNAUTHORIZED, 1003);

    let token = issue(&app).await;
    let (status, body) = get_with_token(&app, "/api/nope", &token).await;
    assert_envelope(status, &body, StatusCode::NOT_FOUND, 2002);
}

#[tokio::test]
async fn test_wrong_method() {
    let (app, _) = test_app();

    let (status, body) = get(&app, "/api/token").await;
    assert_envelope(status, &body, StatusCode::METHOD_NOT_ALLOWED, 2001);

    let token = issue(&app).await;
    let (status, body) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/hello?access_token={}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_envelope(status, &body, StatusCode::METHOD_NOT_ALLOWED, 2001);
}

#[tokio::test]
async fn test_script_stripped_from_parameters() {
    let (app, _) = test_app();

    // The injected block is removed before the handler sees the name.
    let (status, body) = request_token(
        &app,
        "jason%3Cscript%3Ealert(1)%3C%2Fscript%3E",
        "123",
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {}", body);

    let token = body["result"]["access_token"].as_str().unwrap().to_string();
    let (_, body) = get_with_token(&app, "/api/secured", &token).await;
    assert_eq!(body["result"]["identity"], "jason");
}

#[tokio::test]
async fn test_fully_stripped_parameter_is_missing() {
    let (app, _) = test_app();
    let (status, body) = request_token(&app, "%3Cscript%3Ex%3C%2Fscript%3E", "123").await;
    assert_envelope(status, &body, StatusCode::UNPROCESSABLE_ENTITY, 2201);
}

#[tokio::test]
async fn test_deeply_nested_script_is_rejected() {
    let (app, _) = test_app();
    let user = format!(
        "{}%3Cscript%3E{}",
        "%3Cscr".repeat(64),
        "ipt%3E".repeat(64)
    );

    let (status, body) = request_token(&app, &user, "123").await;
    assert_envelope(status, &body, StatusCode::UNPROCESSABLE_ENTITY, 2202);
    assert!(body["message"].as_str().unwrap().contains("user_name"));
}

#[tokio::test]
async fn test_landing_page_uses_envelope() {
    let (app, _) = test_app();

    for path in ["/", "/index.html"] {
        let (status, body) = get(&app, path).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 200);
        assert_eq!(body["code"], 0);
        assert_eq!(body["message"], "SUCCESS");
        assert!(body["result"].is_string());
    }
}

/// Directory whose backend never answers.
struct UnreachableDirectory;

impl CredentialStore for UnreachableDirectory {
    fn verify(&self, _identity: &str, _password: &str) -> Result<RoleSet, CredentialError> {
        Err(CredentialError::Unavailable(
            "connection to directory.internal:636 timed out".to_string(),
        ))
    }
}

#[tokio::test]
async fn test_internal_fault_hides_detail() {
    let (mut config, _) = test_config();
    config.credentials = Arc::new(UnreachableDirectory);
    let app = create_app(&config);

    let (status, body) = request_token(&app, "jason", "123").await;
    assert_envelope(status, &body, StatusCode::INTERNAL_SERVER_ERROR, 3001);
    assert_eq!(body["message"], "Server Error");

    let raw = body.to_string();
    assert!(!raw.contains("directory.internal"));
    assert!(!raw.contains("timed out"));
}
