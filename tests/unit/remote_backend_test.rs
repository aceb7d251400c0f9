//! Unit tests for the hosted inference backend

use base64::{engine::general_purpose::STANDARD, Engine};
use prompt_image_service::{
    backend::{GenerationBackend, GenerationParams, RemoteBackend},
    config::RemoteConfig,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/models/test-org/test-model";

fn backend(server: &MockServer, api_key: Option<&str>) -> RemoteBackend {
    RemoteBackend::new(&RemoteConfig {
        api_key: api_key.map(String::from),
        base_url: server.uri(),
        model: "test-org/test-model".to_string(),
        timeout_ms: 5000,
    })
    .unwrap()
}

fn params() -> GenerationParams {
    GenerationParams {
        prompt: "a red fox in snow".to_string(),
        style: "oil-painting".to_string(),
        width: 512,
        height: 768,
        num_inference_steps: 20,
    }
}

#[tokio::test]
async fn test_image_response_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("authorization", "Bearer hf_test"))
        .and(body_partial_json(json!({
            "inputs": "a red fox in snow, oil-painting style",
            "parameters": {"width": 512, "height": 768, "num_inference_steps": 20}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(b"\x89PNG-bytes".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let bytes = backend(&server, Some("hf_test")).generate(&params()).await.unwrap();
    assert_eq!(bytes, b"\x89PNG-bytes");
}

#[tokio::test]
async fn test_json_base64_response_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "images": [{"b64_json": STANDARD.encode(b"image-data")}]
        })))
        .mount(&server)
        .await;

    let bytes = backend(&server, Some("hf_test")).generate(&params()).await.unwrap();
    assert_eq!(bytes, b"image-data");
}

#[tokio::test]
async fn test_model_loading_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": "Model test-org/test-model is currently loading",
            "estimated_time": 20.0
        })))
        .mount(&server)
        .await;

    let err = backend(&server, Some("hf_test")).generate(&params()).await.unwrap_err();
    assert!(err.reason.contains("currently unavailable"));
    assert!(err.reason.contains("estimated time 20s"));
}

#[tokio::test]
async fn test_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid token"})))
        .mount(&server)
        .await;

    let err = backend(&server, Some("hf_bad")).generate(&params()).await.unwrap_err();
    assert!(err.reason.contains("credentials"));
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = backend(&server, None).generate(&params()).await.unwrap_err();
    assert!(err.reason.contains("HUGGING_FACE_API_KEY"));
}

#[tokio::test]
async fn test_unexpected_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>maintenance</html>"),
        )
        .mount(&server)
        .await;

    let err = backend(&server, Some("hf_test")).generate(&params()).await.unwrap_err();
    assert!(err.reason.contains("Unexpected response payload"));
}

#[tokio::test]
async fn test_unreachable_service() {
    let backend = RemoteBackend::new(&RemoteConfig {
        api_key: Some("hf_test".to_string()),
        base_url: "http://127.0.0.1:1".to_string(),
        model: "m".to_string(),
        timeout_ms: 2000,
    })
    .unwrap();

    assert!(backend.generate(&params()).await.is_err());
}
