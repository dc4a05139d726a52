//! Bootstrap, API key and webhook endpoint handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    ApiKeyId, BootstrapRequest, CreateApiKeyRequest, HostelRepository, PaymentGateway, Principal,
    RegisterWebhookRequest,
};

use super::{AppState, parse_id};
use crate::inbound::ApiError;

/// Creates the first API key. Only works while no key exists; the raw key
/// is returned once and never stored.
#[tracing::instrument(skip(state), fields(key_name = %req.name))]
pub async fn bootstrap<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<BootstrapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.services.access.bootstrap(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(state, principal), fields(key_name = %req.name))]
pub async fn create_api_key<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let created = state.services.access.create_api_key(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List all API keys (without exposing raw keys).
#[tracing::instrument(skip(state, principal))]
pub async fn list_api_keys<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let keys = state.services.access.list_api_keys(&principal).await?;
    Ok(Json(keys))
}

/// Delete (deactivate) an API key.
#[tracing::instrument(skip(state, principal), fields(key_id = %id))]
pub async fn delete_api_key<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let key_id: ApiKeyId = parse_id(&id, "API key")?;
    state.services.access.delete_api_key(&principal, key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, principal), fields(url = %req.url))]
pub async fn register_webhook<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<RegisterWebhookRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoint = state.services.access.register_webhook(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

#[tracing::instrument(skip(state, principal))]
pub async fn list_webhooks<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let endpoints = state.services.access.list_webhooks(&principal).await?;
    Ok(Json(endpoints))
}
