use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::errors::{ApiError, ServiceError};
use crate::models::LocalFile;
use crate::validation::{FieldViolation, Violations};

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

/// Standard no content response
pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Unwraps a JSON body, turning extractor rejections into the standard error body
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// An image sent inline in a JSON request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    /// Standard base64 of the file bytes
    pub data: String,
}

/// Decodes inline attachments in request order
pub fn decode_attachments(attachments: Vec<ImageAttachment>) -> Result<Vec<LocalFile>, ServiceError> {
    let mut violations = Violations::default();
    let mut files = Vec::with_capacity(attachments.len());

    for attachment in attachments {
        match STANDARD.decode(attachment.data.trim()) {
            Ok(bytes) => files.push(LocalFile::new(
                attachment.file_name,
                attachment.content_type,
                bytes,
            )),
            Err(_) => violations.push(FieldViolation::new(
                "images",
                format!("{} is not valid base64", attachment.file_name),
            )),
        }
    }

    if violations.is_empty() {
        Ok(files)
    } else {
        Err(ServiceError::ValidationFailure(violations))
    }
}
