//! File-storage service
//!
//! Accepts multipart uploads on `/upload`, stores the bytes under a fresh
//! uuid, and returns the file id. Stateless beyond the uploads directory.

use super::{health, trace_from_headers, ApiError};
use crate::config::FileApiConfig;
use crate::flowlog::{Direction, FlowRecord};
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
struct FileApiState {
    upload_dir: PathBuf,
}

pub fn router(config: &FileApiConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/upload", post(upload_file))
        .route("/health", get(health))
        .layer(cors)
        .with_state(FileApiState {
            upload_dir: config.upload_dir.clone(),
        })
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    status: &'static str,
    file_id: String,
}

async fn upload_file(
    State(state): State<FileApiState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let started = Instant::now();
    let trace_id = trace_from_headers(&headers);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(ToString::to_string)
            .unwrap_or_else(|| "unnamed".to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;

        let file_id = uuid::Uuid::new_v4().to_string();

        FlowRecord::new(
            "FILE_API",
            Direction::Inbound,
            "file_upload_received",
            format!("Received multipart file upload: {filename} ({} bytes)", bytes.len()),
        )
        .trace(&trace_id)
        .extra("file_id", Some(file_id.as_str()))
        .emit();

        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|e| ApiError::Internal(format!("Could not create upload dir: {e}")))?;
        let path = state.upload_dir.join(&file_id);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::Internal(format!("Could not save file: {e}")))?;

        FlowRecord::new(
            "FILE_API",
            Direction::Outbound,
            "file_upload_complete",
            format!("File saved successfully: {filename} ({} bytes)", bytes.len()),
        )
        .trace(&trace_id)
        .extra("file_id", Some(file_id.as_str()))
        .extra("status_code", Some(200))
        .extra("duration_ms", Some(format!("{:.2}", started.elapsed().as_secs_f64() * 1000.0)))
        .emit();

        return Ok(Json(UploadResponse {
            status: "success",
            file_id,
        }));
    }

    Err(ApiError::BadRequest(
        "Multipart body had no `file` field".to_string(),
    ))
}
