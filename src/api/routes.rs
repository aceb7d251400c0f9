//! Router construction

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::warn;

use crate::api::handlers;
use crate::config::ServerConfig;
use crate::middleware::{AuthLayer, RateLimitLayer};
use crate::AppState;

/// Build the application router. Routes are served both bare and under the
/// `/api/.../` paths existing clients use.
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    let mut generation = Router::new()
        .route("/generate", post(handlers::generate))
        .route("/api/generate/", post(handlers::generate));

    if settings.rate_limit.enabled {
        generation = generation.route_layer(RateLimitLayer::new(
            settings.rate_limit.requests_per_second,
            settings.rate_limit.burst_size,
        ));
    }

    Router::new()
        .merge(generation)
        .route("/history", get(handlers::history))
        .route("/api/history/", get(handlers::history))
        .route("/health", get(handlers::health))
        .route("/api/health/", get(handlers::health))
        .nest_service("/media", ServeDir::new(&settings.storage.media_root))
        .layer(AuthLayer::new(settings.auth.token_map()))
        .layer(cors_layer(&settings.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
}
