//! Functional tests for the generation endpoint

mod common;

use axum::http::StatusCode;
use common::{body_json, build_app, get, post_json, StubBackend, ALICE_TOKEN};
use prompt_image_service::{backend::BackendKind, history::HistoryRepository, identity::Identity};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_generate_example_scenario() {
    let app = build_app(StubBackend::ok());

    let response = app
        .router
        .clone()
        .oneshot(post_json(
            "/generate",
            json!({"prompt": "a red fox in snow", "style": "oil-painting", "width": 512, "height": 512}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["model_used"], "stub-diffusion");
    assert!(body["generation_time"].as_f64().unwrap() > 0.0);
    assert_eq!(body["data"]["style"], "oil-painting");
    assert_eq!(body["data"]["prompt"], "a red fox in snow");
    assert_eq!(body["data"]["model_used"], "stub-diffusion");
    assert!(body["data"]["id"].is_string());
    assert!(body["data"]["timestamp"].is_string());

    // The record points at the one file that was written
    let image = body["data"]["image"].as_str().unwrap();
    assert!(app.media.path().join(image).is_file());
    assert_eq!(
        body["data"]["image_url"],
        format!("http://testserver/media/{}", image)
    );
    assert_eq!(app.stored_files(), 1);
    assert_eq!(app.history.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_generate_out_of_range_has_no_side_effects() {
    let app = build_app(StubBackend::ok());

    for body in [
        json!({"prompt": "p", "width": 128}),
        json!({"prompt": "p", "height": 2048}),
        json!({"prompt": "p", "num_inference_steps": 0}),
        json!({"prompt": "p", "num_inference_steps": 101}),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/generate", body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    assert_eq!(app.backend.calls(), 0);
    assert_eq!(app.stored_files(), 0);
    assert_eq!(app.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_generate_validation_error_shape() {
    let app = build_app(StubBackend::ok());

    let response = app
        .router
        .clone()
        .oneshot(post_json("/generate", json!({"width": 2000}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["prompt"], json!(["This field is required."]));
    assert_eq!(
        body["width"],
        json!(["Ensure this value is less than or equal to 1024."])
    );
}

#[tokio::test]
async fn test_generate_malformed_json() {
    let app = build_app(StubBackend::ok());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/generate")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["non_field_errors"].is_array());
}

#[tokio::test]
async fn test_remote_failure_returns_hosted_hints_first() {
    let app = build_app(StubBackend::failing(BackendKind::Remote, "Inference API returned 503"));

    let response = app
        .router
        .clone()
        .oneshot(post_json("/generate", json!({"prompt": "p"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.find("hugging_face_issues") < text.find("local_model_issues"));

    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("Hugging Face API"));
    assert!(error.contains("503"));
    assert_eq!(body["troubleshooting"]["hugging_face_issues"].as_array().unwrap().len(), 3);
    assert_eq!(app.history.count().await.unwrap(), 0);
    assert_eq!(app.stored_files(), 0);
}

#[tokio::test]
async fn test_local_failure_returns_local_hints_first() {
    let app = build_app(StubBackend::failing(BackendKind::Local, "CUDA out of memory"));

    let response = app
        .router
        .clone()
        .oneshot(post_json("/generate", json!({"prompt": "p"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.find("local_model_issues") < text.find("hugging_face_issues"));
    assert!(text.contains("local model"));
    assert_eq!(app.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_corrupt_backend_output_creates_no_record() {
    let app = build_app(StubBackend::returning(b"not an image".to_vec()));

    let response = app
        .router
        .clone()
        .oneshot(post_json("/generate", json!({"prompt": "p"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Failed to store the generated image");
    assert!(body["troubleshooting"].is_object());
    assert_eq!(app.stored_files(), 0);
    assert_eq!(app.history.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_same_prompt_twice_is_not_deduplicated() {
    let app = build_app(StubBackend::ok());

    let mut images = Vec::new();
    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(post_json("/generate", json!({"prompt": "same prompt"}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        images.push(body["data"]["image"].as_str().unwrap().to_string());
    }

    assert_ne!(images[0], images[1]);
    assert_eq!(app.stored_files(), 2);
    assert_eq!(app.history.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_authenticated_generation_is_owned() {
    let app = build_app(StubBackend::ok());

    let response = app
        .router
        .clone()
        .oneshot(post_json("/api/generate/", json!({"prompt": "mine"}), Some(ALICE_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let alice = app
        .history
        .list_for(&Identity::User("alice".to_string()), 50)
        .await
        .unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].prompt, "mine");

    let anonymous = app.history.list_for(&Identity::Anonymous, 50).await.unwrap();
    assert!(anonymous.is_empty());
}

#[tokio::test]
async fn test_health_reports_configuration() {
    let app = build_app(StubBackend::ok());

    for uri in ["/health", "/api/health/"] {
        let response = app.router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["hugging_face_configured"], false);
        assert_eq!(body["local_model_enabled"], false);
        assert_eq!(body["history_records"], 0);
        assert_eq!(
            body["available_endpoints"],
            json!(["/api/generate/", "/api/history/", "/api/health/"])
        );
    }
}

#[tokio::test]
async fn test_stored_image_is_served() {
    let app = build_app(StubBackend::ok());

    let response = app
        .router
        .clone()
        .oneshot(post_json("/generate", json!({"prompt": "p"}), None))
        .await
        .unwrap();
    let body = body_json(response).await;
    let image = body["data"]["image"].as_str().unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/media/{}", image), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
