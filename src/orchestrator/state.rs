//! Orchestrator state types

use crate::flowlog::TraceId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Conversation messages
// ============================================================================

/// Who a conversation entry is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    User,
    Assistant,
    System,
    Error,
}

/// One rendered conversation entry. Append-only: never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Assistant,
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Error,
            text: text.into(),
        }
    }
}

// ============================================================================
// Attachment slot
// ============================================================================

/// A locally staged file. At most one is held at a time; attaching again
/// replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub path: PathBuf,
}

impl AttachedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { name, path }
    }
}

// ============================================================================
// Server-supplied upload directive
// ============================================================================

/// Directive carried on a chat response. Transient: consumed immediately on
/// receipt, never stored.
///
/// The two wire shapes are `{type:"elicitation", mode:"url", url, message}`
/// and `{type:"stream_upload", mode:"stream", url, message}`; the `type` tag
/// is authoritative and the redundant `mode` field is ignored on decode.
/// Only [`UploadDirective::Elicitation`] uploads are followed by a
/// completion notice, so that asymmetry is a branch on the variant rather
/// than a string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadDirective {
    /// Interactive pick-then-POST; completion is reported back to the AI
    /// service.
    Elicitation { url: String, message: String },
    /// Direct streaming upload; fire-and-forget, no completion callback.
    StreamUpload { url: String, message: String },
}

impl UploadDirective {
    pub fn url(&self) -> &str {
        match self {
            UploadDirective::Elicitation { url, .. } | UploadDirective::StreamUpload { url, .. } => {
                url
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UploadDirective::Elicitation { message, .. }
            | UploadDirective::StreamUpload { message, .. } => message,
        }
    }
}

// ============================================================================
// Flow state
// ============================================================================

/// Which directive variant a pending pick was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickKind {
    /// Elicitation flow: trace header on the upload, completion notice after.
    Interactive,
    /// Stream flow: no trace header, no completion notice.
    Stream,
}

/// Everything stashed between receiving a directive and the upload
/// finishing: the target URL, the user-facing prompt, and the trace id of
/// the operation that produced the directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPick {
    pub url: String,
    pub prompt: String,
    pub trace_id: TraceId,
    pub kind: PickKind,
}

impl PendingPick {
    /// Trace id to send with the upload itself. Stream uploads omit it.
    pub fn upload_trace(&self) -> Option<TraceId> {
        match self.kind {
            PickKind::Interactive => Some(self.trace_id.clone()),
            PickKind::Stream => None,
        }
    }
}

/// Orchestrator control state.
///
/// `Idle → SendingChat → {Idle | AwaitingFilePick → Uploading → {Idle |
/// Notifying → Idle}}`. Every busy state has a guaranteed exit: each
/// in-flight operation resolves to exactly one terminal event.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlowState {
    /// Ready for user input, no pending operation.
    #[default]
    Idle,

    /// Chat POST in flight.
    SendingChat { trace_id: TraceId },

    /// File prompt open; not busy - the chat operation already completed.
    AwaitingFilePick { pick: PendingPick },

    /// Multipart upload in flight.
    Uploading { pick: PendingPick },

    /// Completion notice POST in flight (interactive uploads only).
    Notifying { trace_id: TraceId },
}

impl FlowState {
    /// True exactly while a network operation is in flight. Derived from
    /// the state rather than tracked separately, so it cannot get stuck.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            FlowState::SendingChat { .. } | FlowState::Uploading { .. } | FlowState::Notifying { .. }
        )
    }

    /// Whether the file prompt should be open.
    pub fn awaiting_pick(&self) -> Option<&PendingPick> {
        match self {
            FlowState::AwaitingFilePick { pick } => Some(pick),
            _ => None,
        }
    }
}
