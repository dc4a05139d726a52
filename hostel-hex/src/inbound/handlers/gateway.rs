use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
};

use hostel_types::{AppError, HostelRepository, PaymentGateway};

use super::AppState;
use crate::inbound::ApiError;

/// Header carrying the hex HMAC-SHA256 of the raw webhook body.
pub const GATEWAY_SIGNATURE_HEADER: &str = "X-Razorpay-Signature";

/// Gateway webhook. Authenticated by the body signature, not an API key.
#[tracing::instrument(skip(state, headers, body), fields(bytes = body.len()))]
pub async fn gateway_webhook<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(GATEWAY_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing webhook signature".into()))?;

    let ack = state.services.gateway.handle_webhook(&body, signature).await?;
    Ok(Json(ack))
}
