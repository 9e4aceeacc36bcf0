//! Mock transports for session and UI tests

use super::traits::{ChatApi, ChatReply, FileStore};
use crate::client::TransportError;
use crate::flowlog::TraceId;
use crate::orchestrator::state::AttachedFile;
use crate::orchestrator::UploadDirective;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted chat API: replies are popped in order; an empty script or a
/// scripted `Err` surfaces as a transport failure.
#[derive(Default)]
pub struct MockChatApi {
    replies: Mutex<VecDeque<Result<ChatReply, String>>>,
    pub chats: Mutex<Vec<(String, bool, TraceId)>>,
    pub completions: Mutex<Vec<(String, TraceId)>>,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_with(self, response: &str, directive: Option<UploadDirective>) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            response: response.to_string(),
            directive,
        }));
        self
    }

    pub fn fail_with(self, error: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
        self
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn chat(
        &self,
        message: &str,
        has_attached_file: bool,
        trace_id: &TraceId,
    ) -> Result<ChatReply, TransportError> {
        self.chats
            .lock()
            .unwrap()
            .push((message.to_string(), has_attached_file, trace_id.clone()));

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(TransportError::network(error)),
            None => Err(TransportError::network("no scripted reply")),
        }
    }

    async fn complete_elicitation(
        &self,
        file_id: &str,
        trace_id: &TraceId,
    ) -> Result<(), TransportError> {
        self.completions
            .lock()
            .unwrap()
            .push((file_id.to_string(), trace_id.clone()));
        Ok(())
    }

    async fn health(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Recording file store: every upload is captured; the result is fixed.
pub struct MockFileStore {
    result: Result<String, String>,
    pub uploads: Mutex<Vec<(String, String, Option<TraceId>)>>,
}

impl MockFileStore {
    pub fn returning(file_id: &str) -> Self {
        Self {
            result: Ok(file_id.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: &str) -> Self {
        Self {
            result: Err(error.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn upload(
        &self,
        file: &AttachedFile,
        url: &str,
        trace_id: Option<&TraceId>,
    ) -> Result<String, TransportError> {
        self.uploads.lock().unwrap().push((
            file.name.clone(),
            url.to_string(),
            trace_id.cloned(),
        ));

        match &self.result {
            Ok(file_id) => Ok(file_id.clone()),
            Err(error) => Err(TransportError::status(500, error.clone())),
        }
    }
}
