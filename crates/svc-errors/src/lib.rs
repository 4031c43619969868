//! Error taxonomy shared by the service pipeline, storage adapters, and the
//! REST controller.
//!
//! The taxonomy is semantic, not a type hierarchy: every layer below the
//! controller produces a [`ServiceError`], and the controller is the only
//! place that turns a `ServiceError` into an HTTP response (status code +
//! `{"errors": [...]}` body). No other layer is allowed to know about HTTP.

use http::StatusCode;
use serde::Serialize;

/// Semantic error kind. Mirrors the taxonomy table: one kind per row, one
/// HTTP status per kind, no exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BadRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    DuplicateKey,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DuplicateKey => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One entry of the wire-level error envelope.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorItem {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorItem {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    #[must_use]
    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Wire-level error body: `{"errors": [...]}`. The only shape an error
/// response is allowed to take per the external interface contract.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ErrorEnvelope {
    pub errors: Vec<ErrorItem>,
}

/// A single field-path validation failure, as produced by `ModelSpec::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// The error type every pipeline layer below the controller returns.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    #[error("validation failed: {} field error(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::BadRequest(_) => ErrorKind::BadRequest,
            ServiceError::Unauthenticated => ErrorKind::Unauthenticated,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::NotFound => ErrorKind::NotFound,
            ServiceError::DuplicateKey(_) => ErrorKind::DuplicateKey,
            ServiceError::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }

    /// Render the wire-level `{"errors": [...]}` body for this error.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let errors = match self {
            ServiceError::Validation(violations) => violations
                .iter()
                .map(|v| ErrorItem::new(v.message.clone()).on_field(v.field.clone()))
                .collect(),
            ServiceError::BadRequest(msg) => vec![ErrorItem::new(msg.clone())],
            ServiceError::Unauthenticated => vec![ErrorItem::new("unauthenticated")],
            ServiceError::Forbidden(msg) => vec![ErrorItem::new(msg.clone())],
            ServiceError::NotFound => vec![ErrorItem::new("not found")],
            ServiceError::DuplicateKey(msg) => vec![ErrorItem::new(msg.clone())],
            ServiceError::Internal(_) => vec![ErrorItem::new("internal error")],
        };
        ErrorEnvelope { errors }
    }

    #[must_use]
    pub fn not_found() -> Self {
        ServiceError::NotFound
    }

    #[must_use]
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ServiceError::BadRequest(detail.into())
    }

    #[must_use]
    pub fn forbidden(detail: impl Into<String>) -> Self {
        ServiceError::Forbidden(detail.into())
    }

    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        ServiceError::Internal(detail.into())
    }

    #[must_use]
    pub fn validation(violations: Vec<FieldViolation>) -> Self {
        ServiceError::Validation(violations)
    }
}

/// Convenience alias used throughout the pipeline and storage crates.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy_table() {
        assert_eq!(ErrorKind::Validation.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::BadRequest.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::DuplicateKey.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_envelope_carries_field_paths() {
        let err = ServiceError::validation(vec![FieldViolation::new("name", "is required")]);
        let envelope = err.to_envelope();
        assert_eq!(envelope.errors.len(), 1);
        assert_eq!(envelope.errors[0].field.as_deref(), Some("name"));
    }

    #[test]
    fn internal_error_detail_never_reaches_the_wire() {
        let err = ServiceError::internal("pool exhausted: password=hunter2");
        let envelope = err.to_envelope();
        assert_eq!(envelope.errors[0].message, "internal error");
    }
}
