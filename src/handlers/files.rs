use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::errors::ServiceError;
use crate::store::check_storage_path;
use crate::AppState;

/// Serves a stored blob under the URL its `download_url` handed out.
async fn serve_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, ServiceError> {
    let not_found = || ServiceError::NotFound(format!("File {path}"));
    check_storage_path(&path).map_err(|_| not_found())?;

    let blob = state
        .blobs
        .fetch(&path)
        .await
        .map_err(|e| ServiceError::ExternalServiceError(e.to_string()))?
        .ok_or_else(not_found)?;

    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok(([(header::CONTENT_TYPE, content_type)], blob.bytes).into_response())
}

pub fn file_routes() -> Router<AppState> {
    Router::new().route("/files/*path", get(serve_file))
}
