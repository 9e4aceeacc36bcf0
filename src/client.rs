//! HTTP clients for the AI service and the file-storage service
//!
//! Thin reqwest wrappers: translate to the wire shapes, classify failures,
//! and hand back typed results. No retries - a failed request surfaces as a
//! conversation error and the next user action starts a clean cycle.

mod error;

pub use error::{TransportError, TransportErrorKind};

use crate::config::ClientConfig;
use crate::flowlog::TraceId;
use crate::orchestrator::state::AttachedFile;
use crate::orchestrator::UploadDirective;
use crate::runtime::{ChatApi, ChatReply, FileStore};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header that threads the per-operation trace id across services.
pub const TRACE_HEADER: &str = "X-Trace-ID";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the AI orchestration service.
pub struct AiClient {
    http: Client,
    base_url: String,
}

impl AiClient {
    pub fn new(config: &ClientConfig) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: config.ai_service_url.clone(),
        }
    }
}

#[async_trait]
impl ChatApi for AiClient {
    async fn chat(
        &self,
        message: &str,
        has_attached_file: bool,
        trace_id: &TraceId,
    ) -> Result<ChatReply, TransportError> {
        let body = ChatRequestBody {
            message,
            has_attached_file,
        };

        let response = self
            .http
            .post(format!("{}/chat", self.base_url))
            .header(TRACE_HEADER, trace_id.as_str())
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::status(
                status.as_u16(),
                format!("Chat request failed: HTTP {status}: {body}"),
            ));
        }

        let parsed: ChatResponseBody = serde_json::from_str(&body)
            .map_err(|e| TransportError::decode(format!("Failed to parse chat response: {e}")))?;

        // The `type` tag is authoritative; unrecognized directive shapes are
        // dropped rather than failing the whole chat round trip.
        let directive = parsed
            .elicitation
            .and_then(|value| serde_json::from_value::<UploadDirective>(value).ok());

        Ok(ChatReply {
            response: parsed.response,
            directive,
        })
    }

    async fn complete_elicitation(
        &self,
        file_id: &str,
        trace_id: &TraceId,
    ) -> Result<(), TransportError> {
        let response = self
            .http
            .post(format!("{}/elicitation/complete", self.base_url))
            .header(TRACE_HEADER, trace_id.as_str())
            .json(&CompletionBody {
                status: "success",
                file_id,
            })
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status(
                status.as_u16(),
                format!("Completion notice failed: HTTP {status}"),
            ));
        }
        Ok(())
    }

    async fn health(&self) -> Result<(), TransportError> {
        let response = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::status(
                status.as_u16(),
                format!("Health check failed: HTTP {status}"),
            ));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::decode(format!("Malformed health response: {e}")))?;
        if body.get("status").and_then(serde_json::Value::as_str) != Some("ok") {
            return Err(TransportError::decode(format!(
                "Unexpected health response: {body}"
            )));
        }
        Ok(())
    }
}

/// Client for multipart uploads to a server-supplied URL.
pub struct FileStoreClient {
    http: Client,
}

impl FileStoreClient {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");
        Self { http }
    }
}

impl Default for FileStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for FileStoreClient {
    async fn upload(
        &self,
        file: &AttachedFile,
        url: &str,
        trace_id: Option<&TraceId>,
    ) -> Result<String, TransportError> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| TransportError::io(format!("Could not read {}: {e}", file.path.display())))?;

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file.name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.http.post(url).multipart(form);
        if let Some(trace_id) = trace_id {
            request = request.header(TRACE_HEADER, trace_id.as_str());
        }

        let response = request.send().await.map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::status(
                status.as_u16(),
                format!("Upload failed: HTTP {status}: {body}"),
            ));
        }

        let parsed: UploadResponseBody = serde_json::from_str(&body)
            .map_err(|e| TransportError::decode(format!("Failed to parse upload response: {e}")))?;

        Ok(parsed.file_id)
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    has_attached_file: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    response: String,
    #[serde(default)]
    elicitation: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    status: &'a str,
    file_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponseBody {
    file_id: String,
}
