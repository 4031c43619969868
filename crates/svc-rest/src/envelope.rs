//! Wire-level response shapes. Every successful body is `{"data": ...}`;
//! every error body is `{"errors": [...]}` with the status matching the
//! error's semantic kind — the controller is the only layer allowed to
//! make that translation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use svc_errors::ServiceError;

#[derive(Debug, Clone, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// A success response carrying the status code the operation earned:
/// `201` for create, `200` for everything else (§6).
pub struct ApiResponse<T> {
    status: StatusCode,
    data: T,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data,
        }
    }

    #[must_use]
    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(DataEnvelope { data: self.data })).into_response()
    }
}

/// Newtype over [`ServiceError`] so this crate can provide the
/// `IntoResponse` impl the orphan rule forbids on the foreign type
/// directly.
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "internal error handling request");
        } else {
            tracing::warn!(error = %self.0, status = %status, "request failed");
        }
        (status, Json(self.0.to_envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svc_errors::FieldViolation;

    #[test]
    fn api_error_carries_the_error_kinds_status() {
        let err = ApiError::from(ServiceError::NotFound);
        assert_eq!(err.0.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn data_envelope_serializes_under_the_data_key() {
        let env = DataEnvelope { data: 42 };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["data"], 42);
    }

    #[test]
    fn validation_error_envelope_carries_field_paths() {
        let err = ServiceError::validation(vec![FieldViolation::new("name", "is required")]);
        let envelope = err.to_envelope();
        assert_eq!(envelope.errors[0].field.as_deref(), Some("name"));
    }
}
