//! Common error types for the image generation service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field-keyed validation messages, serialized as `{"field": ["message", ...]}`
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Rejected request input. A normal outcome, not a fault.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid request: {} field(s) rejected", .0.len())]
pub struct ValidationErrors(pub FieldErrors);

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self(errors)
    }

    pub fn fields(&self) -> &FieldErrors {
        &self.0
    }
}

/// Failure raised by a generation backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct GenerationFailure {
    pub reason: String,
}

impl GenerationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure while normalizing or storing an artifact
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Generated data is not a decodable image: {0}")]
    Decode(String),

    #[error("Failed to encode image as PNG: {0}")]
    Encode(String),

    #[error("Artifact storage error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure in the history record store
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationFailure),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error body for failures outside the generation flow
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(errors) => {
                return (StatusCode::BAD_REQUEST, Json(errors.0.clone())).into_response();
            }
            AppError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Generation(_)
            | AppError::Artifact(_)
            | AppError::Repository(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
