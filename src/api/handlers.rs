//! HTTP handlers for generation, history and health

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::backend::BackendKind;
use crate::error::{AppError, Result};
use crate::generation::{GenerateInput, Troubleshooting};
use crate::history::HistoryRecordView;
use crate::identity::Identity;
use crate::AppState;

/// Endpoints advertised by the health check
pub const AVAILABLE_ENDPOINTS: [&str; 3] = ["/api/generate/", "/api/history/", "/api/health/"];

const MAX_ERROR_CHARS: usize = 300;

/// Body of a successful generation
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub data: HistoryRecordView,
    pub generation_time: f64,
    pub model_used: String,
}

/// Body of a failed generation
#[derive(Debug, Serialize)]
pub struct GenerationFailureResponse {
    pub success: bool,
    pub error: String,
    pub troubleshooting: Troubleshooting,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub hugging_face_configured: bool,
    pub local_model_enabled: bool,
    /// `None` when the history store could not be reached
    pub history_records: Option<u64>,
    pub available_endpoints: Vec<&'static str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

fn caller(identity: Option<Extension<Identity>>) -> Identity {
    identity.map(|Extension(identity)| identity).unwrap_or_default()
}

fn backend_label(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Local => "local model",
        BackendKind::Remote => "Hugging Face API",
    }
}

/// Short, user-facing description of a generation failure
fn failure_message(err: &AppError, kind: BackendKind) -> String {
    match err {
        AppError::Generation(failure) => {
            let reason: String = failure.reason.chars().take(MAX_ERROR_CHARS).collect();
            format!("Image generation failed ({}): {}", backend_label(kind), reason)
        }
        AppError::Artifact(_) => "Failed to store the generated image".to_string(),
        AppError::Repository(_) => "Failed to record the generation".to_string(),
        _ => "Internal error during generation".to_string(),
    }
}

/// `POST /generate`
pub async fn generate(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
    payload: std::result::Result<Json<GenerateInput>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let body = serde_json::json!({ "non_field_errors": [rejection.body_text()] });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };

    let identity = caller(identity);
    match state.orchestrator.generate(&input, &identity).await {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(GenerateResponse {
                success: true,
                data: outcome.record.into(),
                generation_time: outcome.generation_time,
                model_used: outcome.model_used,
            }),
        )
            .into_response(),
        Err(AppError::Validation(errors)) => {
            (StatusCode::BAD_REQUEST, Json(errors.0)).into_response()
        }
        Err(err) => {
            warn!(error = %err, "Generation request failed");
            let kind = state.orchestrator.backend_kind();
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerationFailureResponse {
                    success: false,
                    error: failure_message(&err, kind),
                    troubleshooting: Troubleshooting::for_backend(kind),
                }),
            )
                .into_response()
        }
    }
}

/// `GET /history`
pub async fn history(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<Identity>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryRecordView>>> {
    let identity = caller(identity);
    let page_size = state.settings.history.page_size.max(1);
    let limit = query.limit.unwrap_or(page_size).clamp(1, page_size);

    let records = state.history.list_for(&identity, limit).await?;
    Ok(Json(records.into_iter().map(HistoryRecordView::from).collect()))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let history_records = match state.history.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!(error = %e, "History store unavailable during health check");
            None
        }
    };

    Json(HealthResponse {
        status: "healthy",
        hugging_face_configured: state.settings.hugging_face_configured(),
        local_model_enabled: state.settings.local.enabled,
        history_records,
        available_endpoints: AVAILABLE_ENDPOINTS.to_vec(),
    })
}
