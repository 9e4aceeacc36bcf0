//! Pure state transition function
//!
//! Given the same state, attachment slot, and event, `transition` always
//! produces the same next state and effects, with no I/O. All network and
//! UI work is described as [`Effect`]s for the runtime to execute.

use super::state::{AttachedFile, FlowState, Message, PendingPick, PickKind, UploadDirective};
use super::{Effect, Event};
use crate::flowlog::TraceId;

/// Result of a state transition.
#[derive(Debug)]
pub struct Transition {
    pub next: FlowState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn to(next: FlowState) -> Self {
        Self {
            next,
            effects: vec![],
        }
    }

    /// No state change, no effects. Used for inputs treated as silent
    /// no-ops (empty text, events while busy, stray completions).
    pub fn stay(state: &FlowState) -> Self {
        Self::to(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Pure transition function.
///
/// `attached` is the current attachment slot, passed read-only; transitions
/// that change it do so through effects.
pub fn transition(state: &FlowState, attached: Option<&AttachedFile>, event: Event) -> Transition {
    match (state, event) {
        // ============================================================
        // Sending a chat message
        // ============================================================

        (FlowState::Idle, Event::SendRequested { text, trace_id }) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Transition::stay(state);
            }

            let shown = match attached {
                Some(file) => format!("{text} [file: {}]", file.name),
                None => text.clone(),
            };

            Transition::to(FlowState::SendingChat {
                trace_id: trace_id.clone(),
            })
            .with_effect(Effect::AppendMessage(Message::user(shown)))
            .with_effect(Effect::SendChat {
                text,
                has_attached_file: attached.is_some(),
                trace_id,
            })
        }

        // Sends while busy or while the prompt is open are silent no-ops.
        (_, Event::SendRequested { .. }) => Transition::stay(state),

        // ============================================================
        // Chat response handling
        // ============================================================

        (FlowState::SendingChat { trace_id }, Event::ChatArrived { reply, directive }) => {
            let base = Transition::to(FlowState::Idle)
                .with_effect(Effect::AppendMessage(Message::assistant(reply)));

            match directive {
                None => base,
                Some(directive) => dispatch_directive(base, directive, trace_id, attached),
            }
        }

        (FlowState::SendingChat { .. }, Event::ChatFailed { error }) => {
            Transition::to(FlowState::Idle).with_effect(Effect::AppendMessage(Message::error(error)))
        }

        // ============================================================
        // File selection
        // ============================================================

        (FlowState::AwaitingFilePick { pick }, Event::FileChosen { file }) => {
            let trace_id = pick.upload_trace();
            Transition::to(FlowState::Uploading { pick: pick.clone() })
                .with_effect(Effect::AppendMessage(Message::user(format!(
                    "Selected file: {}",
                    file.name
                ))))
                .with_effect(Effect::UploadFile {
                    url: pick.url.clone(),
                    file,
                    trace_id,
                })
        }

        // Closing the prompt without a selection leaves everything idle.
        (FlowState::AwaitingFilePick { .. }, Event::PickDismissed) => Transition::to(FlowState::Idle),

        // ============================================================
        // Upload completion
        // ============================================================

        (FlowState::Uploading { pick }, Event::UploadFinished { file_id }) => {
            let success =
                Effect::AppendMessage(Message::assistant(format!(
                    "File uploaded successfully (file_id: {file_id})"
                )));

            // The completion-notice asymmetry: interactive uploads report
            // back to the AI service, stream uploads never do.
            match pick.kind {
                PickKind::Interactive => Transition::to(FlowState::Notifying {
                    trace_id: pick.trace_id.clone(),
                })
                .with_effect(success)
                .with_effect(Effect::NotifyCompletion {
                    file_id,
                    trace_id: pick.trace_id.clone(),
                }),
                PickKind::Stream => Transition::to(FlowState::Idle)
                    .with_effect(success)
                    .with_effect(Effect::ResetPicker),
            }
        }

        (FlowState::Uploading { .. }, Event::UploadFailed { error }) => {
            Transition::to(FlowState::Idle)
                .with_effect(Effect::AppendMessage(Message::error(error)))
                .with_effect(Effect::ResetPicker)
        }

        // ============================================================
        // Completion notice
        // ============================================================

        (FlowState::Notifying { .. }, Event::NotifyFinished) => {
            Transition::to(FlowState::Idle).with_effect(Effect::ResetPicker)
        }

        (FlowState::Notifying { .. }, Event::NotifyFailed { error }) => {
            Transition::to(FlowState::Idle)
                .with_effect(Effect::AppendMessage(Message::error(error)))
                .with_effect(Effect::ResetPicker)
        }

        // ============================================================
        // Attachment slot
        // ============================================================

        (FlowState::Idle, Event::AttachRequested { file }) => {
            let note = Message::system(format!("Attached file: {}", file.name));
            Transition::to(FlowState::Idle)
                .with_effect(Effect::SetAttachment(file))
                .with_effect(Effect::AppendMessage(note))
        }

        (FlowState::Idle, Event::DetachRequested) => {
            if attached.is_none() {
                return Transition::stay(state);
            }
            Transition::to(FlowState::Idle).with_effect(Effect::ClearAttachment)
        }

        // ============================================================
        // Everything else is a stray event: ignore.
        // ============================================================
        (state, _) => Transition::stay(state),
    }
}

/// Dispatch a chat response's directive per its variant.
fn dispatch_directive(
    base: Transition,
    directive: UploadDirective,
    trace_id: &TraceId,
    attached: Option<&AttachedFile>,
) -> Transition {
    match directive {
        UploadDirective::Elicitation { url, message } => {
            let pick = PendingPick {
                url,
                prompt: message.clone(),
                trace_id: trace_id.clone(),
                kind: PickKind::Interactive,
            };
            Transition {
                next: FlowState::AwaitingFilePick { pick },
                effects: base.effects,
            }
            .with_effect(Effect::OpenFilePicker { prompt: message })
        }
        UploadDirective::StreamUpload { url, message } => {
            let pick = PendingPick {
                url: url.clone(),
                prompt: message.clone(),
                trace_id: trace_id.clone(),
                kind: PickKind::Stream,
            };
            match attached {
                // A staged file streams immediately; the slot is consumed.
                Some(file) => Transition {
                    next: FlowState::Uploading { pick },
                    effects: base.effects,
                }
                .with_effect(Effect::UploadFile {
                    file: file.clone(),
                    url,
                    trace_id: None,
                })
                .with_effect(Effect::ClearAttachment),
                None => Transition {
                    next: FlowState::AwaitingFilePick { pick },
                    effects: base.effects,
                }
                .with_effect(Effect::OpenFilePicker { prompt: message }),
            }
        }
    }
}
