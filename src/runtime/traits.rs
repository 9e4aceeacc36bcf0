//! Trait abstractions for the chat transports
//!
//! These traits enable testing the session with mock implementations.

use crate::client::TransportError;
use crate::flowlog::TraceId;
use crate::orchestrator::state::AttachedFile;
use crate::orchestrator::UploadDirective;
use async_trait::async_trait;
use std::sync::Arc;

/// A chat round trip's typed result.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub response: String,
    pub directive: Option<UploadDirective>,
}

/// Client for the AI orchestration service.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// POST a chat message; the reply may carry an upload directive.
    async fn chat(
        &self,
        message: &str,
        has_attached_file: bool,
        trace_id: &TraceId,
    ) -> Result<ChatReply, TransportError>;

    /// POST the completion notice for an interactive upload.
    async fn complete_elicitation(
        &self,
        file_id: &str,
        trace_id: &TraceId,
    ) -> Result<(), TransportError>;

    /// Probe the service's health endpoint.
    async fn health(&self) -> Result<(), TransportError>;
}

/// Client for multipart uploads to server-supplied URLs.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Upload a file, returning the server-assigned file id. `trace_id` is
    /// `None` for stream-mode uploads, which omit the trace header.
    async fn upload(
        &self,
        file: &AttachedFile,
        url: &str,
        trace_id: Option<&TraceId>,
    ) -> Result<String, TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatApi + ?Sized> ChatApi for Arc<T> {
    async fn chat(
        &self,
        message: &str,
        has_attached_file: bool,
        trace_id: &TraceId,
    ) -> Result<ChatReply, TransportError> {
        (**self).chat(message, has_attached_file, trace_id).await
    }

    async fn complete_elicitation(
        &self,
        file_id: &str,
        trace_id: &TraceId,
    ) -> Result<(), TransportError> {
        (**self).complete_elicitation(file_id, trace_id).await
    }

    async fn health(&self) -> Result<(), TransportError> {
        (**self).health().await
    }
}

#[async_trait]
impl<T: FileStore + ?Sized> FileStore for Arc<T> {
    async fn upload(
        &self,
        file: &AttachedFile,
        url: &str,
        trace_id: Option<&TraceId>,
    ) -> Result<String, TransportError> {
        (**self).upload(file, url, trace_id).await
    }
}
