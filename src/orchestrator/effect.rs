//! Effects produced by state transitions

use super::state::{AttachedFile, Message};
use crate::flowlog::TraceId;

/// Side effects requested by a transition, executed by the runtime in
/// order. A single transition produces at most one network effect, which is
/// what serializes user-initiated operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append an entry to the conversation.
    AppendMessage(Message),

    /// POST the chat request to the AI service.
    SendChat {
        text: String,
        has_attached_file: bool,
        trace_id: TraceId,
    },

    /// Open the file prompt with the server-supplied message.
    OpenFilePicker { prompt: String },

    /// Multipart-POST a file to a server-supplied URL. `trace_id` is only
    /// present for interactive uploads; stream uploads omit the header.
    UploadFile {
        file: AttachedFile,
        url: String,
        trace_id: Option<TraceId>,
    },

    /// POST the completion notice back to the AI service. Only ever emitted
    /// for interactive uploads.
    NotifyCompletion { file_id: String, trace_id: TraceId },

    /// Stage a file in the attachment slot (replacing any previous one).
    SetAttachment(AttachedFile),

    /// Clear the attachment slot.
    ClearAttachment,

    /// Reset the file prompt so the same file can be re-picked later.
    ResetPicker,
}

impl Effect {
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Effect::SendChat { .. } | Effect::UploadFile { .. } | Effect::NotifyCompletion { .. }
        )
    }
}
