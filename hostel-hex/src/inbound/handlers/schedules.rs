use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use hostel_types::{
    AppError, AsOfQuery, CreateScheduleRequest, GenerateDueRequest, HostelRepository,
    PaymentGateway, Principal, ScheduleId,
};

use super::{AppState, optional_json, parse_id, scope, today_or};
use crate::inbound::ApiError;

#[tracing::instrument(skip(state, principal), fields(hostel_id = %req.hostel_id, frequency = %req.frequency))]
pub async fn create_schedule<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schedule = state.services.schedules.create_schedule(&principal, req).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

#[tracing::instrument(skip(state, principal), fields(schedule_id = %id))]
pub async fn get_schedule<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let schedule_id: ScheduleId = parse_id(&id, "schedule")?;
    let schedule = state.services.schedules.get_schedule(&principal, schedule_id).await?;
    Ok(Json(schedule))
}

/// `POST /api/schedules/{id}/{action}` for pause, resume and cancel.
///
/// `resume` accepts an optional `{"today": "YYYY-MM-DD"}` body.
#[tracing::instrument(skip(state, principal, body), fields(schedule_id = %id, %action))]
pub async fn transition<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    Path((id, action)): Path<(String, String)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let schedule_id: ScheduleId = parse_id(&id, "schedule")?;
    let schedules = &state.services.schedules;
    let schedule = match action.as_str() {
        "pause" => schedules.pause(&principal, schedule_id).await?,
        "resume" => {
            let req: AsOfQuery = optional_json(&body)?;
            schedules
                .resume(&principal, schedule_id, today_or(req.today))
                .await?
        }
        "cancel" => schedules.cancel(&principal, schedule_id).await?,
        other => {
            return Err(ApiError(AppError::NotFound(format!(
                "Unknown schedule action '{}'",
                other
            ))));
        }
    };
    Ok(Json(schedule))
}

/// Generate the payments that have fallen due.
#[tracing::instrument(skip(state, principal, body))]
pub async fn generate<R: HostelRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: GenerateDueRequest = optional_json(&body)?;
    let hostel_id = scope(&principal, req.hostel_id)?;
    let generated = state
        .services
        .schedules
        .generate_due_payments(today_or(req.as_of), hostel_id)
        .await?;
    Ok(Json(generated))
}
