use super::state::{ReceivedUpload, ReceiverState};
use crate::upload::FIELD_NAME;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub size: usize,
    pub received_at: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/upload
/// Store the `audio` part of a multipart upload
pub async fn receive_upload(
    State(state): State<ReceiverState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
            }
        };

        if field.name() != Some(FIELD_NAME) {
            continue;
        }

        let original_filename = field.file_name().unwrap_or("recording.wav").to_string();
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to read upload body: {}", e);
                return error_response(StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e));
            }
        };

        if data.is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "Audio file is empty");
        }

        let id = uuid::Uuid::new_v4().to_string();
        let stored_as = state
            .upload_dir
            .join(format!("{}.{}", id, extension_of(&original_filename)));

        if let Err(e) = tokio::fs::write(&stored_as, &data).await {
            error!("Failed to store upload {}: {}", stored_as.display(), e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload");
        }

        let upload = ReceivedUpload {
            id: id.clone(),
            original_filename: original_filename.clone(),
            stored_as,
            size: data.len(),
            received_at: Utc::now(),
        };

        info!(
            "Received {} ({} bytes) as {}",
            upload.original_filename,
            upload.size,
            upload.stored_as.display()
        );

        let response = UploadResponse {
            id,
            filename: original_filename,
            size: upload.size,
            received_at: upload.received_at.to_rfc3339(),
        };

        state.record(upload).await;

        return (StatusCode::OK, Json(response)).into_response();
    }

    error_response(StatusCode::BAD_REQUEST, "No audio file provided")
}

/// GET /api/uploads
/// List the most recent uploads, oldest first
pub async fn list_uploads(State(state): State<ReceiverState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.received().await))
}

/// GET /
pub async fn banner() -> impl IntoResponse {
    (StatusCode::OK, "rec-uploader receiver")
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Lower-case alphanumeric extension of an uploaded name, `wav` otherwise
fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "wav".to_string())
}
