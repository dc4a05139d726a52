//! Mapping of application errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use hostel_types::AppError;

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<hostel_types::RepoError> for ApiError {
    fn from(err: hostel_types::RepoError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.0 {
            AppError::Internal(detail) => {
                tracing::error!(%detail, "Internal error");
                "Internal server error".to_string()
            }
            AppError::Gateway(detail) => {
                tracing::warn!(%detail, "Gateway error");
                detail
            }
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::PermissionDenied(msg)
            | AppError::Unauthorized(msg) => msg,
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::BadRequest("x".into()), 400),
            (AppError::NotFound("x".into()), 404),
            (AppError::Conflict("x".into()), 409),
            (AppError::PermissionDenied("x".into()), 403),
            (AppError::Unauthorized("x".into()), 401),
            (AppError::Gateway("x".into()), 502),
            (AppError::Internal("x".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError(err).status().as_u16(), code);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let response = ApiError(AppError::Internal("db password wrong".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
