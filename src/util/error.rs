use axum::{http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;

use crate::util::write_lock::LockTimeout;

/// Failures that are answered with a non-200 status. Webhook operations never
/// use these; they always answer with a `{success:false}` body.
#[derive(Debug, Serialize)]
pub enum HandlerErrorKind {
    BadRequest,
    Validation,
    Internal,
}

impl std::fmt::Display for HandlerErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandlerErrorKind::BadRequest => "BadRequest",
            HandlerErrorKind::Validation => "Validation",
            HandlerErrorKind::Internal => "Internal",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Serialize)]
pub struct HandlerError {
    pub error: HandlerErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl HandlerError {
    pub fn validation(errors: validator::ValidationErrors) -> Self {
        HandlerError {
            error: HandlerErrorKind::Validation,
            message: "Invalid request".to_string(),
            details: Some(errors.to_string()),
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match self.error {
            HandlerErrorKind::Validation | HandlerErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            HandlerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, axum::Json(self)).into_response()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// A mandatory field was blank after trimming; nothing was written.
    MissingRequiredField(String),
    /// The write lock could not be taken in time; nothing was written.
    ServerBusy,
    /// The payload matched no known record shape.
    UnknownAction(String),
    /// The body was not a JSON object.
    InvalidPayload(String),
    NotFound(String),
    InvalidInput(String),
    InternalError(String),
    Conflict(String),
}

impl ServiceError {
    /// Stable tag sent to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::MissingRequiredField(_) => "MissingRequiredField",
            ServiceError::ServerBusy => "ServerBusy",
            ServiceError::UnknownAction(_) => "UnknownAction",
            ServiceError::InvalidPayload(_) => "InvalidPayload",
            ServiceError::NotFound(_) => "NotFound",
            ServiceError::InvalidInput(_) => "InvalidInput",
            ServiceError::InternalError(_) => "InternalError",
            ServiceError::Conflict(_) => "Conflict",
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::MissingRequiredField(field) => write!(f, "Missing required field: {}", field),
            ServiceError::ServerBusy => write!(f, "Server busy, please try again."),
            ServiceError::UnknownAction(msg) => write!(f, "Unknown action: {}", msg),
            ServiceError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ServiceError::InvalidInput(msg) => write!(f, "Invalid Input: {}", msg),
            ServiceError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            ServiceError::Conflict(msg) => write!(f, "Conflict: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<crate::repository::repository_error::RepositoryError> for ServiceError {
    fn from(err: crate::repository::repository_error::RepositoryError) -> Self {
        use crate::repository::repository_error::RepositoryError;
        match err {
            RepositoryError::MissingRequiredField(field) => ServiceError::MissingRequiredField(field),
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::ValidationError(msg) => ServiceError::InvalidInput(msg),
            RepositoryError::AlreadyExists(msg) => ServiceError::Conflict(msg),
            RepositoryError::DatabaseError(msg) => ServiceError::InternalError(msg),
            RepositoryError::ConnectionError(msg) => ServiceError::InternalError(msg),
            RepositoryError::SerializationError(msg) => ServiceError::InternalError(msg),
            RepositoryError::Generic(e) => ServiceError::InternalError(e.to_string()),
        }
    }
}

impl From<LockTimeout> for ServiceError {
    fn from(_: LockTimeout) -> Self {
        ServiceError::ServerBusy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::repository_error::RepositoryError;

    #[test]
    fn test_repository_errors_map_to_service_errors() {
        let err: ServiceError = RepositoryError::missing_field("id").into();
        assert_eq!(err, ServiceError::MissingRequiredField("id".to_string()));
        assert_eq!(err.code(), "MissingRequiredField");

        let err: ServiceError = RepositoryError::already_exists("ZN-2026-001").into();
        assert_eq!(err.code(), "Conflict");
    }

    #[test]
    fn test_busy_message() {
        let err: ServiceError = LockTimeout.into();
        assert_eq!(err.to_string(), "Server busy, please try again.");
    }
}
