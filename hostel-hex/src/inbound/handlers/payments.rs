use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    CreatePaymentRequest, DispatchRemindersRequest, HostelRepository, ManualPaymentRequest,
    PaymentGateway, PaymentId, PaymentListQuery, Principal, UpdatePaymentStatusRequest,
    VerifyCheckoutRequest,
};

use super::{AppState, optional_json, parse_id, scope, today_or};
use crate::inbound::ApiError;

fn created_or_replayed(created: bool) -> StatusCode {
    if created { StatusCode::CREATED } else { StatusCode::OK }
}

/// Create a pending payment. Replaying an idempotency key answers 200 with
/// the original payment.
#[tracing::instrument(skip(state, principal), fields(hostel_id = %req.hostel_id, amount = %req.amount))]
pub async fn create_payment<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (payment, created) = state.services.payments.create_payment(&principal, req).await?;
    Ok((created_or_replayed(created), Json(payment)))
}

#[tracing::instrument(skip(state, principal))]
pub async fn list_payments<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PaymentListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let payments = state.services.payments.list_payments(&principal, query).await?;
    Ok(Json(payments))
}

#[tracing::instrument(skip(state, principal), fields(payment_id = %id))]
pub async fn get_payment<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let payment = state.services.payments.get_payment(&principal, payment_id).await?;
    Ok(Json(payment))
}

/// Record money already received offline.
#[tracing::instrument(skip(state, principal), fields(hostel_id = %req.hostel_id, method = %req.method))]
pub async fn record_manual_payment<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ManualPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (payment, created) = state
        .services
        .requests
        .record_manual_payment(&principal, req)
        .await?;
    Ok((created_or_replayed(created), Json(payment)))
}

#[tracing::instrument(skip(state, principal), fields(payment_id = %id, to = %req.status))]
pub async fn update_status<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let payment = state
        .services
        .payments
        .update_status(&principal, payment_id, req)
        .await?;
    Ok(Json(payment))
}

/// Open (or reopen) the gateway checkout for a pending payment.
#[tracing::instrument(skip(state, principal), fields(payment_id = %id))]
pub async fn checkout<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let checkout = state
        .services
        .requests
        .initiate_online_payment(&principal, payment_id)
        .await?;
    Ok(Json(checkout))
}

#[tracing::instrument(skip(state, principal, req), fields(order_id = %req.order_id))]
pub async fn verify_checkout<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<VerifyCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state.services.gateway.verify_checkout(&principal, req).await?;
    Ok(Json(payment))
}

#[tracing::instrument(skip(state, principal), fields(payment_id = %id))]
pub async fn list_reminders<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment_id: PaymentId = parse_id(&id, "payment")?;
    let reminders = state
        .services
        .reminders
        .list_for_payment(&principal, payment_id)
        .await?;
    Ok(Json(reminders))
}

/// Record and dispatch the reminders due today.
#[tracing::instrument(skip(state, principal, body))]
pub async fn dispatch_reminders<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: DispatchRemindersRequest = optional_json(&body)?;
    let hostel_id = scope(&principal, req.hostel_id)?;
    let dispatched = state
        .services
        .reminders
        .dispatch(today_or(req.today), hostel_id)
        .await?;
    Ok(Json(dispatched))
}
