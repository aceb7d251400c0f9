//! Bearer token identity middleware
//!
//! Resolves `Authorization: Bearer <token>` (or `Token <token>`) against the
//! configured token table and attaches the resulting [`Identity`] to the
//! request. Requests without credentials continue as anonymous; unknown
//! tokens are rejected.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use std::{
    collections::HashMap,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::ErrorResponse;
use crate::identity::Identity;

/// Identity layer
#[derive(Clone)]
pub struct AuthLayer {
    tokens: Arc<HashMap<String, String>>,
}

impl AuthLayer {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: Arc::new(tokens),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

/// Identity middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    tokens: Arc<HashMap<String, String>>,
}

fn is_public(path: &str) -> bool {
    path == "/health" || path.starts_with("/api/health") || path.starts_with("/media/")
}

/// Extract the token from an `Authorization` header value
fn parse_token(header: &str) -> Option<&str> {
    let header = header.trim_start();
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .unwrap_or(header)
        .trim();
    (!token.is_empty()).then_some(token)
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        if is_public(request.uri().path()) {
            let future = self.inner.call(request);
            return Box::pin(future);
        }

        let token = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_token)
            .map(str::to_string);

        let identity = match token {
            None => Identity::Anonymous,
            Some(token) => match self.tokens.get(&token) {
                Some(user) => {
                    debug!(user = %user, "Authenticated request");
                    Identity::User(user.clone())
                }
                None => {
                    warn!("Invalid token provided");
                    return Box::pin(async move { Ok(create_auth_error_response("Invalid token.")) });
                }
            },
        };

        request.extensions_mut().insert(identity);
        let future = self.inner.call(request);
        Box::pin(future)
    }
}

fn create_auth_error_response(message: &str) -> Response {
    let error = ErrorResponse {
        success: false,
        error: message.to_string(),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}
