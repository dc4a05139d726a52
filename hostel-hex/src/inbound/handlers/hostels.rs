//! Hostel-level handlers: the hostel itself plus its bookings, schedules,
//! overdue payments, ledger and reports.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    AsOfQuery, CreateHostelRequest, HostelId, HostelRepository, LedgerQuery, PaymentGateway,
    Principal, SummaryQuery,
};

use super::{AppState, parse_id, today_or};
use crate::inbound::ApiError;

#[tracing::instrument(skip(state, principal), fields(name = %req.name))]
pub async fn create_hostel<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateHostelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel = state.services.hostels.create_hostel(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(hostel)))
}

#[tracing::instrument(skip(state, principal))]
pub async fn list_hostels<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, ApiError> {
    let hostels = state.services.hostels.list_hostels(&principal).await?;
    Ok(Json(hostels))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn get_hostel<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let hostel = state.services.hostels.get_hostel(&principal, hostel_id).await?;
    Ok(Json(hostel))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn list_bookings<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let bookings = state.services.bookings.list_bookings(&principal, hostel_id).await?;
    Ok(Json(bookings))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn list_overdue<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let overdue = state
        .services
        .payments
        .list_overdue(&principal, hostel_id, today_or(query.today))
        .await?;
    Ok(Json(overdue))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn list_schedules<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let schedules = state.services.schedules.list_schedules(&principal, hostel_id).await?;
    Ok(Json(schedules))
}

/// Replays the hostel's payments and refunds into a running balance.
#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn ledger<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let ledger = state.services.ledger.ledger(&principal, hostel_id, query).await?;
    Ok(Json(ledger))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn summary<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let summary = state.services.reports.summary(&principal, hostel_id, query).await?;
    Ok(Json(summary))
}

#[tracing::instrument(skip(state, principal), fields(hostel_id = %id))]
pub async fn overdue_report<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(query): Query<AsOfQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hostel_id: HostelId = parse_id(&id, "hostel")?;
    let report = state
        .services
        .reports
        .overdue_report(&principal, hostel_id, today_or(query.today))
        .await?;
    Ok(Json(report))
}
