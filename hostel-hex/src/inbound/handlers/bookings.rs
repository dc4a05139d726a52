use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    BookingId, CreateBookingRequest, HostelRepository, PaymentGateway, Principal,
    RequestAdvanceRequest,
};

use super::{AppState, optional_json, parse_id};
use crate::inbound::ApiError;

#[tracing::instrument(skip(state, principal), fields(hostel_id = %req.hostel_id))]
pub async fn create_booking<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state.services.bookings.create_booking(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[tracing::instrument(skip(state, principal), fields(booking_id = %id))]
pub async fn get_booking<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let booking = state.services.bookings.get_booking(&principal, booking_id).await?;
    Ok(Json(booking))
}

/// `POST /api/bookings/{id}/{action}` for approve, reject, confirm,
/// check-in, check-out and cancel.
#[tracing::instrument(skip(state, principal), fields(booking_id = %id, %action))]
pub async fn transition<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path((id, action)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let bookings = &state.services.bookings;
    let booking = match action.as_str() {
        "approve" => bookings.approve(&principal, booking_id).await?,
        "reject" => bookings.reject(&principal, booking_id).await?,
        "confirm" => bookings.confirm(&principal, booking_id).await?,
        "check-in" => bookings.check_in(&principal, booking_id).await?,
        "check-out" => bookings.check_out(&principal, booking_id).await?,
        "cancel" => bookings.cancel(&principal, booking_id).await?,
        other => {
            return Err(ApiError(hostel_types::AppError::NotFound(format!(
                "Unknown booking action '{}'",
                other
            ))));
        }
    };
    Ok(Json(booking))
}

/// Creates (or returns the existing) booking advance payment.
#[tracing::instrument(skip(state, principal, body), fields(booking_id = %id))]
pub async fn request_advance<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id: BookingId = parse_id(&id, "booking")?;
    let req: RequestAdvanceRequest = optional_json(&body)?;
    let (payment, created) = state
        .services
        .requests
        .request_booking_advance(&principal, booking_id, req)
        .await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(payment)))
}
