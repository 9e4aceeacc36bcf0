//! `OpenAI` chat-completions client for the AI service
//!
//! One specialized call: a system prompt, the user's message, and the
//! `request_file_process` tool bound. Translate out, normalize back.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// LLM error with classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub message: String,
}

impl LlmError {
    fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Network issues, timeouts.
    Network,
    /// Authentication failed (401, 403).
    Auth,
    /// Rate limited (429).
    RateLimit,
    /// Anything else the API rejected.
    Api,
}

/// Arguments the model passed to `request_file_process`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FileProcessArgs {
    pub message: Option<String>,
    pub mode: Option<String>,
}

/// One normalized model turn: the text plus an optional tool invocation.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    pub text: String,
    pub tool_call: Option<FileProcessArgs>,
}

pub struct OpenAiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_CHAT_URL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for one turn with the upload tool bound.
    pub async fn request_turn(&self, system: &str, user: &str) -> Result<LlmTurn, LlmError> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system",
                    content: system,
                },
                OpenAIMessage {
                    role: "user",
                    content: user,
                },
            ],
            tools: vec![file_process_tool()],
            temperature: 0.0,
        };

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::new(LlmErrorKind::Network, format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::new(LlmErrorKind::Network, format!("Connection failed: {e}"))
                } else {
                    LlmError::new(LlmErrorKind::Network, format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::new(LlmErrorKind::Network, format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let parsed: OpenAIResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::new(
                LlmErrorKind::Api,
                format!("Failed to parse response: {e} - body: {body}"),
            )
        })?;

        Ok(normalize_response(parsed))
    }
}

fn classify_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::new(
            LlmErrorKind::Auth,
            format!("Authentication failed: {body}"),
        ),
        429 => LlmError::new(LlmErrorKind::RateLimit, format!("Rate limited: {body}")),
        _ => LlmError::new(LlmErrorKind::Api, format!("HTTP {status}: {body}")),
    }
}

fn normalize_response(response: OpenAIResponse) -> LlmTurn {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .unwrap_or_default();

    let tool_call = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|call| call.function.name == "request_file_process")
        .map(|call| serde_json::from_str(&call.function.arguments).unwrap_or_default());

    LlmTurn {
        text: message.content.unwrap_or_default(),
        tool_call,
    }
}

fn file_process_tool() -> OpenAITool {
    OpenAITool {
        r#type: "function",
        function: OpenAIFunction {
            name: "request_file_process",
            description: "Initiates a file processing request. Use this when the user wants to \
                          upload, process, or work with a file. The tool will return an upload URL.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "A friendly message to display to the user asking them to select a file"
                    },
                    "mode": {
                        "type": "string",
                        "enum": ["ui", "stream"],
                        "description": "Upload mode - \"ui\" for the client's file picker (elicitation flow), \"stream\" for direct streaming to the API"
                    }
                }
            }),
        },
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: String,
    messages: Vec<OpenAIMessage<'a>>,
    tools: Vec<OpenAITool>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIChoiceMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    function: OpenAIFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_a_tool_calling_response() {
        let parsed: OpenAIResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {
                                "name": "request_file_process",
                                "arguments": "{\"message\":\"Pick a file\",\"mode\":\"ui\"}"
                            }
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();

        let turn = normalize_response(parsed);
        assert_eq!(turn.text, "");
        assert_eq!(
            turn.tool_call,
            Some(FileProcessArgs {
                message: Some("Pick a file".to_string()),
                mode: Some("ui".to_string()),
            })
        );
    }

    #[test]
    fn normalizes_a_plain_text_response() {
        let parsed: OpenAIResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"Hello!","tool_calls":null}}]}"#,
        )
        .unwrap();

        let turn = normalize_response(parsed);
        assert_eq!(turn.text, "Hello!");
        assert!(turn.tool_call.is_none());
    }

    #[test]
    fn malformed_tool_arguments_degrade_to_defaults() {
        let parsed: OpenAIResponse = serde_json::from_str(
            r#"{
                "choices": [{
                    "message": {
                        "tool_calls": [{
                            "function": { "name": "request_file_process", "arguments": "not json" }
                        }]
                    }
                }]
            }"#,
        )
        .unwrap();

        let turn = normalize_response(parsed);
        assert_eq!(turn.tool_call, Some(FileProcessArgs::default()));
    }

    #[test]
    fn request_wire_shape_binds_the_tool() {
        let request = OpenAIRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![OpenAIMessage {
                role: "user",
                content: "upload file",
            }],
            tools: vec![file_process_tool()],
            temperature: 0.0,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "request_file_process");
        assert_eq!(
            value["tools"][0]["function"]["parameters"]["properties"]["mode"]["enum"][0],
            "ui"
        );
    }
}
