//! Backend triad: ai-service, mcp-server, file-api
//!
//! Each service is an axum router plus its own state, mirroring the three
//! processes the chat client talks to. They share only the flow-logging
//! conventions and the trace header.

pub mod ai;
pub mod file_api;
pub mod mcp;

use crate::client::TRACE_HEADER;
use crate::flowlog::TraceId;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Trace id from the `X-Trace-ID` header, or a placeholder for requests
/// that arrived without one.
pub(crate) fn trace_from_headers(headers: &HeaderMap) -> TraceId {
    headers
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(TraceId::from_header)
        .unwrap_or_else(|| TraceId::from_header("unknown"))
}

/// Shared `{"status":"ok"}` health payload.
pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    error: String,
}

/// Handler error, rendered as a JSON error body.
#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
