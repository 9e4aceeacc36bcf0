//! Effect runtime driving the orchestrator against the transports
//!
//! [`ChatSession`] owns the conversation state and applies pure transitions;
//! network effects come back as a [`WorkItem`] for the caller to execute
//! (inline via [`ChatSession::run_event`], or spawned so a UI stays
//! responsive). Every work item resolves to exactly one terminal [`Event`] -
//! the return type makes skipping the cleanup path unrepresentable, which is
//! what keeps the busy flag from ever getting stuck.

pub mod traits;

#[cfg(test)]
pub mod testing;

pub use traits::{ChatApi, ChatReply, FileStore};

use crate::flowlog::{Direction, FlowRecord, TraceId};
use crate::orchestrator::state::AttachedFile;
use crate::orchestrator::{transition, Effect, Event, FlowState, Message};
use std::future::Future;
use std::sync::Arc;

/// A single network operation extracted from a transition's effects.
///
/// At most one exists per user action (enforced by the state machine), so
/// operations serialize naturally.
#[derive(Debug, Clone)]
pub enum WorkItem {
    SendChat {
        text: String,
        has_attached_file: bool,
        trace_id: TraceId,
    },
    Upload {
        file: AttachedFile,
        url: String,
        trace_id: Option<TraceId>,
    },
    Notify {
        file_id: String,
        trace_id: TraceId,
    },
}

impl WorkItem {
    /// The terminal failure event for this operation. Callers use this when
    /// the executing task itself dies (panic, abort), so even that exit path
    /// delivers exactly one terminal event.
    pub fn failure_event(&self, error: impl Into<String>) -> Event {
        let error = error.into();
        match self {
            WorkItem::SendChat { .. } => Event::ChatFailed { error },
            WorkItem::Upload { .. } => Event::UploadFailed { error },
            WorkItem::Notify { .. } => Event::NotifyFailed { error },
        }
    }
}

/// The chat client's conversation: ordered messages, the single attachment
/// slot, the file-prompt state, and the orchestrator control state.
pub struct ChatSession<A, F> {
    state: FlowState,
    messages: Vec<Message>,
    attached: Option<AttachedFile>,
    picker_prompt: Option<String>,
    api: Arc<A>,
    store: Arc<F>,
}

impl<A, F> ChatSession<A, F>
where
    A: ChatApi + 'static,
    F: FileStore + 'static,
{
    pub fn new(api: A, store: F) -> Self {
        Self {
            state: FlowState::Idle,
            messages: Vec::new(),
            attached: None,
            picker_prompt: None,
            api: Arc::new(api),
            store: Arc::new(store),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn attached(&self) -> Option<&AttachedFile> {
        self.attached.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Prompt text while the file picker should be open.
    pub fn picker_prompt(&self) -> Option<&str> {
        self.picker_prompt.as_deref()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    // ------------------------------------------------------------------
    // User actions (each generates its own trace id where one is needed)
    // ------------------------------------------------------------------

    pub fn send(&mut self, text: impl Into<String>) -> Option<WorkItem> {
        self.dispatch(Event::SendRequested {
            text: text.into(),
            trace_id: TraceId::generate(),
        })
    }

    pub fn choose_file(&mut self, path: impl Into<std::path::PathBuf>) -> Option<WorkItem> {
        self.dispatch(Event::FileChosen {
            file: AttachedFile::from_path(path),
        })
    }

    pub fn dismiss_picker(&mut self) -> Option<WorkItem> {
        self.picker_prompt = None;
        self.dispatch(Event::PickDismissed)
    }

    pub fn attach(&mut self, path: impl Into<std::path::PathBuf>) -> Option<WorkItem> {
        self.dispatch(Event::AttachRequested {
            file: AttachedFile::from_path(path),
        })
    }

    pub fn detach(&mut self) -> Option<WorkItem> {
        self.dispatch(Event::DetachRequested)
    }

    // ------------------------------------------------------------------
    // Event dispatch
    // ------------------------------------------------------------------

    /// Apply one event: run the pure transition, fold its effects into the
    /// session, and hand back the network operation (if any) to execute.
    pub fn dispatch(&mut self, event: Event) -> Option<WorkItem> {
        let result = transition(&self.state, self.attached.as_ref(), event);
        self.state = result.next;

        let mut work = None;
        for effect in result.effects {
            match effect {
                Effect::AppendMessage(message) => self.messages.push(message),
                Effect::SetAttachment(file) => self.attached = Some(file),
                Effect::ClearAttachment => self.attached = None,
                Effect::OpenFilePicker { prompt } => self.picker_prompt = Some(prompt),
                Effect::ResetPicker => self.picker_prompt = None,
                Effect::SendChat {
                    text,
                    has_attached_file,
                    trace_id,
                } => {
                    work = Some(WorkItem::SendChat {
                        text,
                        has_attached_file,
                        trace_id,
                    });
                }
                Effect::UploadFile {
                    file,
                    url,
                    trace_id,
                } => {
                    work = Some(WorkItem::Upload {
                        file,
                        url,
                        trace_id,
                    });
                }
                Effect::NotifyCompletion { file_id, trace_id } => {
                    work = Some(WorkItem::Notify { file_id, trace_id });
                }
            }
        }
        work
    }

    /// Future executing one work item against the session's transports.
    /// Returned detached (`'static`) so a UI can `tokio::spawn` it.
    pub fn work_future(&self, work: WorkItem) -> impl Future<Output = Event> + Send + 'static {
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);
        perform(api, store, work)
    }

    /// Drive an event and any follow-up operations to quiescence. Used by
    /// tests and headless callers; the TUI spawns instead.
    pub async fn run_event(&mut self, event: Event) {
        let mut work = self.dispatch(event);
        while let Some(item) = work {
            let outcome = self.work_future(item).await;
            work = self.dispatch(outcome);
        }
    }
}

/// Execute one work item. Infallible by construction: both the success and
/// the failure of the underlying transport call map to a terminal event.
pub async fn perform<A, F>(api: Arc<A>, store: Arc<F>, work: WorkItem) -> Event
where
    A: ChatApi,
    F: FileStore,
{
    match work {
        WorkItem::SendChat {
            text,
            has_attached_file,
            trace_id,
        } => {
            FlowRecord::new(
                "UI",
                Direction::Outbound,
                "user_message",
                format!("User message: {}", truncate(&text, 100)),
            )
            .trace(&trace_id)
            .extra("file_attached", Some(has_attached_file))
            .emit();

            match api.chat(&text, has_attached_file, &trace_id).await {
                Ok(reply) => {
                    FlowRecord::new(
                        "UI",
                        Direction::Inbound,
                        "chat_response",
                        format!("Chat response: {}", truncate(&reply.response, 100)),
                    )
                    .trace(&trace_id)
                    .extra("elicitation", Some(reply.directive.is_some()))
                    .emit();

                    Event::ChatArrived {
                        reply: reply.response,
                        directive: reply.directive,
                    }
                }
                Err(error) => {
                    FlowRecord::new(
                        "UI",
                        Direction::Inbound,
                        "chat_error",
                        format!("Chat request failed: {error}"),
                    )
                    .trace(&trace_id)
                    .emit();

                    Event::ChatFailed {
                        error: error.to_string(),
                    }
                }
            }
        }

        WorkItem::Upload {
            file,
            url,
            trace_id,
        } => {
            let mut record = FlowRecord::new(
                "UI",
                Direction::Outbound,
                "file_upload",
                format!("Uploading file: {}", file.name),
            )
            .extra("upload_url", Some(url.as_str()));
            if let Some(trace_id) = &trace_id {
                record = record.trace(trace_id);
            }
            record.emit();

            match store.upload(&file, &url, trace_id.as_ref()).await {
                Ok(file_id) => {
                    let mut record = FlowRecord::new(
                        "UI",
                        Direction::Inbound,
                        "upload_complete",
                        format!("Upload complete: {}", file.name),
                    )
                    .extra("file_id", Some(file_id.as_str()));
                    if let Some(trace_id) = &trace_id {
                        record = record.trace(trace_id);
                    }
                    record.emit();

                    Event::UploadFinished { file_id }
                }
                Err(error) => {
                    let mut record = FlowRecord::new(
                        "UI",
                        Direction::Inbound,
                        "upload_error",
                        format!("Upload failed: {error}"),
                    );
                    if let Some(trace_id) = &trace_id {
                        record = record.trace(trace_id);
                    }
                    record.emit();

                    Event::UploadFailed {
                        error: error.to_string(),
                    }
                }
            }
        }

        WorkItem::Notify { file_id, trace_id } => {
            FlowRecord::new(
                "UI",
                Direction::Outbound,
                "elicitation_complete",
                "Reporting upload completion",
            )
            .trace(&trace_id)
            .extra("file_id", Some(file_id.as_str()))
            .emit();

            match api.complete_elicitation(&file_id, &trace_id).await {
                Ok(()) => Event::NotifyFinished,
                Err(error) => {
                    FlowRecord::new(
                        "UI",
                        Direction::Inbound,
                        "elicitation_complete_error",
                        format!("Completion notice failed: {error}"),
                    )
                    .trace(&trace_id)
                    .emit();

                    Event::NotifyFailed {
                        error: error.to_string(),
                    }
                }
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockChatApi, MockFileStore};
    use super::*;
    use crate::orchestrator::{MessageKind, UploadDirective};

    fn stream_directive(url: &str) -> UploadDirective {
        UploadDirective::StreamUpload {
            url: url.to_string(),
            message: "Please select a file".to_string(),
        }
    }

    fn interactive_directive(url: &str) -> UploadDirective {
        UploadDirective::Elicitation {
            url: url.to_string(),
            message: "Please select a file".to_string(),
        }
    }

    #[tokio::test]
    async fn plain_chat_round_trip() {
        let api = MockChatApi::new().reply_with("Hello there!", None);
        let mut session = ChatSession::new(api, MockFileStore::returning("unused"));

        let work = session.send("hi").expect("send should produce work");
        let outcome = session.work_future(work).await;
        assert!(session.is_busy());
        session.dispatch(outcome);

        assert!(!session.is_busy());
        let kinds: Vec<MessageKind> = session.messages().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::User, MessageKind::Assistant]);
    }

    #[tokio::test]
    async fn chat_failure_surfaces_exactly_one_error_message() {
        let api = MockChatApi::new().fail_with("connection refused");
        let mut session = ChatSession::new(api, MockFileStore::returning("unused"));

        session
            .run_event(Event::SendRequested {
                text: "hi".to_string(),
                trace_id: TraceId::generate(),
            })
            .await;

        assert!(!session.is_busy());
        let kinds: Vec<MessageKind> = session.messages().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::User, MessageKind::Error]);
    }

    #[tokio::test]
    async fn stream_elicitation_end_to_end() {
        let api = MockChatApi::new().reply_with(
            "Please select a file.",
            Some(stream_directive("http://x/upload")),
        );
        let store = MockFileStore::returning("abc123");
        let mut session = ChatSession::new(api, store);

        // Chat round trip leaves the picker open.
        let work = session.send("upload file").unwrap();
        let outcome = session.work_future(work).await;
        assert!(session.dispatch(outcome).is_none());
        assert!(session.picker_prompt().is_some());
        assert!(!session.is_busy());

        // Selecting a file performs exactly one multipart POST to the
        // server-supplied URL, without a trace header.
        let work = session.choose_file("/tmp/report.pdf").unwrap();
        let outcome = session.work_future(work).await;
        assert!(session.dispatch(outcome).is_none());

        {
            let uploads = session.store.uploads.lock().unwrap();
            assert_eq!(uploads.len(), 1);
            let (name, url, trace) = &uploads[0];
            assert_eq!(name, "report.pdf");
            assert_eq!(url, "http://x/upload");
            assert!(trace.is_none());
        }

        // The conversation gains an assistant message containing the file
        // id, and no completion notice is ever posted.
        assert!(session
            .messages()
            .iter()
            .any(|m| m.kind == MessageKind::Assistant && m.text.contains("abc123")));
        assert!(session.api.completions.lock().unwrap().is_empty());
        assert!(!session.is_busy());
        assert!(session.picker_prompt().is_none());
    }

    #[tokio::test]
    async fn interactive_elicitation_notifies_exactly_once() {
        let api = MockChatApi::new().reply_with(
            "Please select a file.",
            Some(interactive_directive("http://x/upload")),
        );
        let store = MockFileStore::returning("abc123");
        let mut session = ChatSession::new(api, store);

        session
            .run_event(Event::SendRequested {
                text: "upload file".to_string(),
                trace_id: TraceId::from_header("tr4c3id0"),
            })
            .await;
        session.run_event(Event::FileChosen {
            file: AttachedFile::from_path("/tmp/report.pdf"),
        })
        .await;

        // The upload carried the stashed trace id, and exactly one
        // completion notice followed with the same trace.
        {
            let uploads = session.store.uploads.lock().unwrap();
            assert_eq!(uploads.len(), 1);
            assert_eq!(
                uploads[0].2,
                Some(TraceId::from_header("tr4c3id0"))
            );
        }
        let completions = session.api.completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].0, "abc123");
        assert_eq!(completions[0].1, TraceId::from_header("tr4c3id0"));
    }

    #[tokio::test]
    async fn stream_directive_with_attachment_uploads_and_clears_slot() {
        let api = MockChatApi::new().reply_with(
            "Processing your attached file...",
            Some(stream_directive("http://x/upload")),
        );
        let store = MockFileStore::returning("f1le1d");
        let mut session = ChatSession::new(api, store);

        assert!(session.attach("/tmp/data.csv").is_none());
        session
            .run_event(Event::SendRequested {
                text: "process it".to_string(),
                trace_id: TraceId::generate(),
            })
            .await;

        assert!(session.attached().is_none());
        assert_eq!(session.store.uploads.lock().unwrap().len(), 1);
        assert!(session.api.completions.lock().unwrap().is_empty());
        // The chat itself reported the attachment.
        let (_, has_attached, _) = session.api.chats.lock().unwrap()[0].clone();
        assert!(has_attached);
    }

    #[tokio::test]
    async fn upload_failure_releases_busy_and_appends_error() {
        let api = MockChatApi::new().reply_with(
            "Please select a file.",
            Some(stream_directive("http://x/upload")),
        );
        let store = MockFileStore::failing("disk full");
        let mut session = ChatSession::new(api, store);

        session
            .run_event(Event::SendRequested {
                text: "upload file".to_string(),
                trace_id: TraceId::generate(),
            })
            .await;
        session
            .run_event(Event::FileChosen {
                file: AttachedFile::from_path("/tmp/report.pdf"),
            })
            .await;

        assert!(!session.is_busy());
        assert!(session
            .messages()
            .iter()
            .any(|m| m.kind == MessageKind::Error && m.text.contains("disk full")));
    }

    #[test]
    fn failure_events_match_their_operations() {
        let chat = WorkItem::SendChat {
            text: "hi".to_string(),
            has_attached_file: false,
            trace_id: TraceId::generate(),
        };
        assert!(matches!(
            chat.failure_event("task failed"),
            Event::ChatFailed { .. }
        ));

        let upload = WorkItem::Upload {
            file: AttachedFile::from_path("/tmp/a"),
            url: "http://x/upload".to_string(),
            trace_id: None,
        };
        assert!(matches!(
            upload.failure_event("task failed"),
            Event::UploadFailed { .. }
        ));

        let notify = WorkItem::Notify {
            file_id: "abc".to_string(),
            trace_id: TraceId::generate(),
        };
        assert!(matches!(
            notify.failure_event("task failed"),
            Event::NotifyFailed { .. }
        ));
    }
}
