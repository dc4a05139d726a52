//! HTTP request handlers.

use std::str::FromStr;

use axum::{Json, response::IntoResponse};
use chrono::NaiveDate;
use utoipa::OpenApi;

use hostel_types::{AppError, HostelId, HostelRepository, PaymentGateway, Principal};

use super::error::ApiError;
use crate::Services;
use crate::openapi::ApiDoc;

pub mod access;
pub mod bookings;
pub mod gateway;
pub mod hostels;
pub mod payments;
pub mod refunds;
pub mod schedules;

/// Application state shared across handlers.
pub struct AppState<R: HostelRepository, G: PaymentGateway> {
    pub services: Services<R, G>,
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// The OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(AppError::BadRequest(format!("Invalid {} ID", what))))
}

/// Narrows an optional hostel filter to what the caller may see.
///
/// Scoped keys default to their own hostel and may not name another one.
pub(crate) fn scope(
    principal: &Principal,
    requested: Option<HostelId>,
) -> Result<Option<HostelId>, AppError> {
    match (principal.hostel_id, requested) {
        (Some(_), Some(requested)) => {
            principal.ensure_hostel(requested)?;
            Ok(Some(requested))
        }
        (Some(own), None) => Ok(Some(own)),
        (None, requested) => Ok(requested),
    }
}

/// Parses an optional JSON body; an empty body means all defaults.
pub(crate) fn optional_json<T: serde::de::DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(AppError::BadRequest(format!("Invalid JSON body: {}", e))))
}

pub(crate) fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(crate::service::today)
}
