//! Authentication middleware for API key validation.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use hostel_types::{AppError, HostelRepository, PaymentGateway};

use super::error::ApiError;
use super::handlers::AppState;

/// Extracts the API key from the Authorization header.
/// Expected format: "Bearer <api_key>" or just "<api_key>"
fn extract_api_key(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?.trim();
    Some(header.strip_prefix("Bearer ").unwrap_or(header).trim())
}

/// Routes reachable without an API key.
///
/// The gateway webhook is authenticated by its body signature instead.
fn is_public(method: &Method, path: &str) -> bool {
    match path {
        "/health" | "/api-docs/openapi.json" => true,
        "/api/bootstrap" | "/api/gateway/webhook" => method == Method::POST,
        _ => false,
    }
}

/// Authentication middleware that validates API keys.
///
/// Hashes the presented key, looks it up among the active keys and stores
/// the resulting [`Principal`](hostel_types::Principal) in the request
/// extensions for handlers to authorize against.
pub async fn auth_middleware<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let api_key = match extract_api_key(auth_header) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => return unauthorized("Missing or invalid Authorization header"),
    };

    match state.services.access.authenticate(&api_key).await {
        Ok(Some(principal)) => {
            tracing::debug!(key_id = %principal.key_id, "Authenticated request");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => unauthorized("Invalid API key"),
        Err(e) => {
            tracing::error!("API key verification failed: {}", e);
            ApiError(AppError::Internal(e.to_string())).into_response()
        }
    }
}

fn unauthorized(message: &str) -> Response {
    ApiError(AppError::Unauthorized(message.to_string())).into_response()
}
