//! Functional tests for the history listing endpoint

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, build_app, get, StubBackend, ALICE_TOKEN, BOB_TOKEN};
use prompt_image_service::history::{HistoryRecord, HistoryRepository};
use uuid::Uuid;
use tower::ServiceExt;

fn record(owner: Option<&str>, minutes_ago: i64) -> HistoryRecord {
    HistoryRecord {
        id: Uuid::new_v4(),
        owner: owner.map(String::from),
        prompt: format!("{} {}", owner.unwrap_or("anon"), minutes_ago),
        style: "realistic".to_string(),
        image: format!("generated/generated_{}.png", minutes_ago),
        image_url: None,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
        generation_time: Some(0.5),
        model_used: "stub-diffusion".to_string(),
    }
}

#[tokio::test]
async fn test_anonymous_history_is_capped_and_ownerless() {
    let app = build_app(StubBackend::ok());
    for i in 0..12 {
        app.history.create(record(None, i)).await.unwrap();
    }
    app.history.create(record(Some("alice"), 0)).await.unwrap();

    let response = app.router.clone().oneshot(get("/history", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert!(items.iter().all(|item| item["prompt"].as_str().unwrap().starts_with("anon")));
    assert_eq!(items[0]["prompt"], "anon 0");
}

#[tokio::test]
async fn test_authenticated_history_is_scoped_and_newest_first() {
    let app = build_app(StubBackend::ok());
    app.history.create(record(Some("alice"), 30)).await.unwrap();
    app.history.create(record(Some("bob"), 20)).await.unwrap();
    app.history.create(record(Some("alice"), 10)).await.unwrap();
    app.history.create(record(None, 5)).await.unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get("/api/history/", Some(ALICE_TOKEN)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let prompts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["prompt"].as_str().unwrap())
        .collect();
    assert_eq!(prompts, vec!["alice 10", "alice 30"]);

    let response = app
        .router
        .clone()
        .oneshot(get("/history", Some(BOB_TOKEN)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_view_fields() {
    let app = build_app(StubBackend::ok());
    app.history.create(record(None, 1)).await.unwrap();

    let response = app.router.clone().oneshot(get("/history", None)).await.unwrap();
    let body = body_json(response).await;
    let item = &body[0];

    for field in ["id", "prompt", "style", "image", "image_url", "timestamp", "generation_time", "model_used"] {
        assert!(item.get(field).is_some(), "missing field {}", field);
    }
    assert!(item.get("owner").is_none());
}

#[tokio::test]
async fn test_history_limit_query() {
    let app = build_app(StubBackend::ok());
    for i in 0..5 {
        app.history.create(record(Some("alice"), i)).await.unwrap();
    }

    let response = app
        .router
        .clone()
        .oneshot(get("/history?limit=2", Some(ALICE_TOKEN)))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}
