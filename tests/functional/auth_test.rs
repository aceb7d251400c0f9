//! Functional tests for bearer token identity resolution

mod common;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    routing::get,
    Extension, Router,
};
use common::{body_json, build_app, build_app_with, StubBackend};
use prompt_image_service::{
    config::TokenEntry, history::HistoryRepository, identity::Identity,
    middleware::auth::AuthLayer,
};
use std::collections::HashMap;
use tower::ServiceExt;

async fn whoami(identity: Option<Extension<Identity>>) -> String {
    match identity.map(|Extension(identity)| identity) {
        Some(Identity::User(user)) => user,
        Some(Identity::Anonymous) => "anonymous".to_string(),
        None => "missing".to_string(),
    }
}

fn create_test_app() -> Router {
    let tokens = HashMap::from([
        ("valid-key-1".to_string(), "alice".to_string()),
        ("valid-key-2".to_string(), "bob".to_string()),
    ]);

    Router::new()
        .route("/whoami", get(whoami))
        .route("/health", get(|| async { "healthy" }))
        .layer(AuthLayer::new(tokens))
}

async fn call(app: Router, uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let response = app
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_auth_with_valid_bearer_token() {
    let (status, body) = call(create_test_app(), "/whoami", Some("Bearer valid-key-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "alice");
}

#[tokio::test]
async fn test_auth_with_token_scheme() {
    let (status, body) = call(create_test_app(), "/whoami", Some("Token valid-key-2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "bob");
}

#[tokio::test]
async fn test_auth_without_header_is_anonymous() {
    let (status, body) = call(create_test_app(), "/whoami", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "anonymous");
}

#[tokio::test]
async fn test_auth_with_invalid_key() {
    let (status, body) = call(create_test_app(), "/whoami", Some("Bearer invalid-key")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Invalid token."));
}

#[tokio::test]
async fn test_auth_health_endpoint_bypass() {
    let (status, _) = call(create_test_app(), "/health", Some("Bearer invalid-key")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_token_rejected_on_generate() {
    let app = build_app(StubBackend::ok());

    let response = app
        .router
        .clone()
        .oneshot(common::post_json(
            "/generate",
            serde_json::json!({"prompt": "p"}),
            Some("nobody"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(app.backend.calls(), 0);
}

#[tokio::test]
async fn test_configured_mixed_case_token_owns_generation() {
    let app = build_app_with(StubBackend::ok(), |settings| {
        settings.auth.tokens.push(TokenEntry {
            token: "CaRoL-Token-42".to_string(),
            user: "carol".to_string(),
        });
    });

    let response = app
        .router
        .clone()
        .oneshot(common::post_json(
            "/generate",
            serde_json::json!({"prompt": "mine"}),
            Some("CaRoL-Token-42"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let carol = app
        .history
        .list_for(&Identity::User("carol".to_string()), 50)
        .await
        .unwrap();
    assert_eq!(carol.len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(common::post_json(
            "/generate",
            serde_json::json!({"prompt": "mine"}),
            Some("carol-token-42"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
