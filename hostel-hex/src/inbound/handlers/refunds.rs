use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    CreateRefundRequest, HostelRepository, PaymentGateway, PaymentId, Principal, RefundId,
    RejectRefundRequest,
};

use super::{AppState, parse_id};
use crate::inbound::ApiError;

#[tracing::instrument(skip(state, principal), fields(payment_id = %id, amount = %req.amount))]
pub async fn request_refund<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<CreateRefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let refund = state
        .services
        .refunds
        .request_refund(&principal, payment_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

#[tracing::instrument(skip(state, principal), fields(payment_id = %id))]
pub async fn list_refunds<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let refunds = state.services.refunds.list_refunds(&principal, payment_id).await?;
    Ok(Json(refunds))
}

#[tracing::instrument(skip(state, principal), fields(refund_id = %id))]
pub async fn process_refund<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let refund_id: RefundId = parse_id(&id, "refund")?;
    let processed = state.services.refunds.process_refund(&principal, refund_id).await?;
    Ok(Json(processed))
}

#[tracing::instrument(skip(state, principal), fields(refund_id = %id))]
pub async fn reject_refund<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<RejectRefundRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let refund_id: RefundId = parse_id(&id, "refund")?;
    let refund = state
        .services
        .refunds
        .reject_refund(&principal, refund_id, req)
        .await?;
    Ok(Json(refund))
}
