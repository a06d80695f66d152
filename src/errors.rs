use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::identity::IdentityError;
use crate::auth::AuthError;
use crate::staging::StagingError;
use crate::validation::{FieldViolation, Violations};

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Field-scoped problems the caller can correct and resubmit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<FieldViolation>>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationFailure(Violations),

    #[error("At least one image is required")]
    NoImageSelected,

    #[error("Image upload failed: {0}")]
    UploadFailure(String),

    #[error("Failed to delete {} stored image(s)", paths.len())]
    DeleteFailure { paths: Vec<String> },

    #[error("Failed to save record: {0}")]
    PersistFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Email is already in use")]
    EmailInUse,

    #[error("Email or password is incorrect")]
    InvalidCredential,

    #[error("Image index {index} is out of range for {len} staged image(s)")]
    OutOfRange { index: usize, len: usize },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationFailure(_)
            | Self::NoImageSelected
            | Self::OutOfRange { .. }
            | Self::BadRequest(_)
            | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::EmailInUse => StatusCode::CONFLICT,
            Self::InvalidCredential | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::UploadFailure(_)
            | Self::DeleteFailure { .. }
            | Self::PersistFailure(_)
            | Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Storage failures collapse into one generic notice; the caller resubmits.
    pub fn response_message(&self) -> String {
        match self {
            Self::UploadFailure(_)
            | Self::DeleteFailure { .. }
            | Self::PersistFailure(_)
            | Self::ExternalServiceError(_) => {
                "The operation failed, please try again".to_string()
            }
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Field-scoped violations to surface inline next to the offending input.
    pub fn field_violations(&self) -> Vec<FieldViolation> {
        match self {
            Self::ValidationFailure(violations) => violations.to_vec(),
            Self::NoImageSelected => vec![FieldViolation::new("images", self.to_string())],
            Self::EmailInUse => vec![FieldViolation::new("email", self.to_string())],
            Self::InvalidCredential => vec![FieldViolation::new("password", self.to_string())],
            _ => Vec::new(),
        }
    }

    /// Whether the user can fix the input and resubmit without a retry of the
    /// same request being meaningful on its own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailure(_)
                | Self::NoImageSelected
                | Self::OutOfRange { .. }
                | Self::EmailInUse
                | Self::InvalidCredential
        )
    }
}

impl From<Violations> for ServiceError {
    fn from(violations: Violations) -> Self {
        ServiceError::ValidationFailure(violations)
    }
}

impl From<StagingError> for ServiceError {
    fn from(err: StagingError) -> Self {
        match err {
            StagingError::OutOfRange { index, len } => ServiceError::OutOfRange { index, len },
        }
    }
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailInUse => ServiceError::EmailInUse,
            IdentityError::InvalidCredential => ServiceError::InvalidCredential,
            IdentityError::Backend(msg) => ServiceError::ExternalServiceError(msg),
        }
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let violations = self.field_violations();

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            violations: (!violations.is_empty()).then_some(violations),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::ServiceError(service_error) => service_error.into_response(),
            ApiError::BadRequest(message) => ServiceError::BadRequest(message).into_response(),
        }
    }
}
