//! Events that drive the orchestrator

use super::state::{AttachedFile, UploadDirective};
use crate::flowlog::TraceId;

/// Everything that can happen to the orchestrator: user actions from the
/// UI and completions from the transport layer. Each in-flight operation
/// resolves to exactly one terminal event (`ChatArrived`/`ChatFailed`,
/// `UploadFinished`/`UploadFailed`, `NotifyFinished`/`NotifyFailed`).
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    SendRequested {
        text: String,
        trace_id: TraceId,
    },
    FileChosen {
        file: AttachedFile,
    },
    /// The file prompt was closed without a selection.
    PickDismissed,
    AttachRequested {
        file: AttachedFile,
    },
    DetachRequested,

    // Chat transport events
    ChatArrived {
        reply: String,
        directive: Option<UploadDirective>,
    },
    ChatFailed {
        error: String,
    },

    // Upload transport events
    UploadFinished {
        file_id: String,
    },
    UploadFailed {
        error: String,
    },

    // Completion-notice transport events
    NotifyFinished,
    NotifyFailed {
        error: String,
    },
}
