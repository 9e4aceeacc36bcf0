//! AI orchestration service
//!
//! Bridges the chat client to the LLM and the MCP server: `/chat` runs one
//! model turn with the `request_file_process` tool bound, forwards tool
//! calls to the MCP server, and translates the outcome into the upload
//! directive the client understands. Without an API key the service runs
//! keyword fallback logic instead. LLM and tool failures degrade to error
//! text in the response body, never a 5xx.

pub mod openai;

use self::openai::OpenAiClient;
use super::{health, ApiError};
use crate::client::TRACE_HEADER;
use crate::config::AiServiceConfig;
use crate::flowlog::{Direction, FlowRecord, FlowStep, FlowSummary, TraceId};
use crate::services::mcp::{ELICITATION_REQUIRED, PROTOCOL_VERSION};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

struct AiState {
    mcp_server_url: String,
    llm: Option<OpenAiClient>,
    http: reqwest::Client,
    request_counter: AtomicU64,
}

impl AiState {
    fn next_request_id(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub fn router(config: &AiServiceConfig) -> Router {
    let llm = config
        .openai_api_key
        .as_ref()
        .map(|key| OpenAiClient::new(key, &config.openai_model));

    match &llm {
        Some(llm) => tracing::info!(model = %llm.model(), "LLM initialized"),
        None => tracing::warn!("OPENAI_API_KEY not set; AI service will use fallback logic"),
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(chat))
        .route("/elicitation/complete", post(elicitation_complete))
        .route("/health", get(health))
        .layer(cors)
        .with_state(Arc::new(AiState {
            mcp_server_url: config.mcp_server_url.clone(),
            llm,
            http,
            request_counter: AtomicU64::new(0),
        }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    has_attached_file: bool,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    elicitation: Option<Value>,
}

async fn chat(
    State(state): State<Arc<AiState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let started = Instant::now();
    let trace_id = headers
        .get(TRACE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(TraceId::from_header)
        .unwrap_or_else(TraceId::generate);
    let mut summary = FlowSummary::new();

    FlowRecord::new(
        "UI",
        Direction::Outbound,
        "user_message",
        format!("User message: {}", truncate(&request.message, 100)),
    )
    .trace(&trace_id)
    .extra("file_attached", Some(request.has_attached_file))
    .emit();

    summary.add(
        FlowStep::new(
            "UI",
            "AI_SERVICE",
            format!(
                "User message: '{}' (file_attached={})",
                truncate(&request.message, 50),
                request.has_attached_file
            ),
        )
        .trace(&trace_id),
    );

    let response = match &state.llm {
        Some(llm) => respond_with_llm(&state, llm, &request, &trace_id, &mut summary).await,
        None => {
            FlowRecord::new(
                "AI_SERVICE",
                Direction::Outbound,
                "fallback_response",
                "Using fallback logic (no LLM configured)",
            )
            .trace(&trace_id)
            .emit();
            fallback_response(&request.message)
        }
    };

    FlowRecord::new(
        "AI_SERVICE",
        Direction::Outbound,
        "chat_response",
        format!(
            "Sending response to UI (elicitation={})",
            response.elicitation.is_some()
        ),
    )
    .trace(&trace_id)
    .extra(
        "duration_ms",
        Some(format!("{:.2}", started.elapsed().as_secs_f64() * 1000.0)),
    )
    .emit();

    summary.add(
        FlowStep::new(
            "AI_SERVICE",
            "UI",
            format!(
                "Chat response with {}",
                if response.elicitation.is_some() {
                    "elicitation"
                } else {
                    "no elicitation"
                }
            ),
        )
        .trace(&trace_id)
        .duration_ms(started.elapsed().as_secs_f64() * 1000.0),
    );
    summary.emit();

    Ok(Json(response))
}

/// One LLM turn, with tool calls forwarded to the MCP server. Infallible:
/// every failure becomes error text in the response.
async fn respond_with_llm(
    state: &AiState,
    llm: &OpenAiClient,
    request: &ChatRequest,
    trace_id: &TraceId,
    summary: &mut FlowSummary,
) -> ChatResponse {
    let llm_started = Instant::now();

    FlowRecord::new(
        "LLM",
        Direction::Outbound,
        "llm_request",
        format!("Sending message to LLM (model: {})", llm.model()),
    )
    .trace(trace_id)
    .emit();

    summary.add(
        FlowStep::new(
            "AI_SERVICE",
            "LLM",
            format!("LLM request: {}", truncate(&request.message, 50)),
        )
        .trace(trace_id),
    );

    let turn = match llm
        .request_turn(&system_prompt(request.has_attached_file), &request.message)
        .await
    {
        Ok(turn) => turn,
        Err(error) => {
            FlowRecord::new(
                "AI_SERVICE",
                Direction::Outbound,
                "chat_error",
                format!("Error processing message: {error}"),
            )
            .trace(trace_id)
            .emit();
            return ChatResponse {
                response: format!("Error processing your message: {error}"),
                elicitation: None,
            };
        }
    };

    let llm_duration_ms = llm_started.elapsed().as_secs_f64() * 1000.0;
    FlowRecord::new(
        "LLM",
        Direction::Inbound,
        "llm_response",
        format!("LLM response: {}", truncate(&turn.text, 100)),
    )
    .trace(trace_id)
    .extra("duration_ms", Some(format!("{llm_duration_ms:.2}")))
    .extra("tool_calls_count", Some(usize::from(turn.tool_call.is_some())))
    .emit();

    summary.add(
        FlowStep::new(
            "LLM",
            "AI_SERVICE",
            format!(
                "LLM response with {} tool call(s)",
                usize::from(turn.tool_call.is_some())
            ),
        )
        .trace(trace_id)
        .duration_ms(llm_duration_ms),
    );

    let mut response_text = turn.text;
    let mut elicitation = None;

    if let Some(args) = turn.tool_call {
        let tool_message = args
            .message
            .unwrap_or_else(|| "Please select a file to upload for processing".to_string());
        let mode = effective_mode(args.mode.as_deref(), request.has_attached_file);

        FlowRecord::new(
            "TOOL",
            Direction::Outbound,
            "tool_execute",
            format!("Executing tool: request_file_process (mode={mode})"),
        )
        .trace(trace_id)
        .extra("tool_name", Some("request_file_process"))
        .emit();

        summary.add(
            FlowStep::new(
                "AI_SERVICE",
                "TOOL",
                format!("Tool execution: request_file_process (mode={mode})"),
            )
            .trace(trace_id),
        );

        let tool_started = Instant::now();
        match call_mcp_tool(state, &tool_message, mode, trace_id).await {
            Err(error) => {
                FlowRecord::new(
                    "TOOL",
                    Direction::Inbound,
                    "tool_error",
                    format!("Error calling MCP tool: {error}"),
                )
                .trace(trace_id)
                .extra("tool_name", Some("request_file_process"))
                .emit();
                response_text = format!(
                    "I tried to initiate a file upload, but encountered an error: {error}"
                );
            }
            Ok(mcp_response) => {
                let tool_duration_ms = tool_started.elapsed().as_secs_f64() * 1000.0;
                match interpret_mcp_response(&mcp_response, &tool_message) {
                    McpOutcome::UrlElicitation { url, message } => {
                        FlowRecord::new(
                            "TOOL",
                            Direction::Inbound,
                            "elicitation_url_received",
                            "Received URL-mode elicitation from MCP server",
                        )
                        .trace(trace_id)
                        .extra("tool_name", Some("request_file_process"))
                        .extra("upload_url", Some(url.as_str()))
                        .extra("duration_ms", Some(format!("{tool_duration_ms:.2}")))
                        .emit();

                        summary.add(
                            FlowStep::new(
                                "TOOL",
                                "AI_SERVICE",
                                "Elicitation URL received (mode=url)",
                            )
                            .trace(trace_id)
                            .upload_url(&url),
                        );

                        elicitation = Some(json!({
                            "type": "elicitation",
                            "mode": "url",
                            "message": message,
                            "url": url
                        }));
                        if response_text.is_empty() {
                            response_text = "Please select a file to upload.".to_string();
                        }
                    }
                    McpOutcome::StreamUpload { url, payload } => {
                        FlowRecord::new(
                            "TOOL",
                            Direction::Inbound,
                            "stream_url_received",
                            "Received stream upload URL from MCP server",
                        )
                        .trace(trace_id)
                        .extra("tool_name", Some("request_file_process"))
                        .extra("upload_url", Some(url.as_str()))
                        .extra("duration_ms", Some(format!("{tool_duration_ms:.2}")))
                        .emit();

                        summary.add(
                            FlowStep::new(
                                "TOOL",
                                "AI_SERVICE",
                                "Stream upload URL received (mode=stream)",
                            )
                            .trace(trace_id)
                            .upload_url(&url),
                        );

                        elicitation = Some(payload);
                        if response_text.is_empty() {
                            response_text = if request.has_attached_file {
                                "Processing your attached file...".to_string()
                            } else {
                                tool_message.clone()
                            };
                        }
                    }
                    McpOutcome::ToolError(message) => {
                        FlowRecord::new(
                            "TOOL",
                            Direction::Inbound,
                            "tool_error",
                            format!("MCP tool error: {message}"),
                        )
                        .trace(trace_id)
                        .extra("tool_name", Some("request_file_process"))
                        .emit();
                        response_text = format!("Error calling tool: {message}");
                    }
                    McpOutcome::Unrecognized => {
                        FlowRecord::new(
                            "TOOL",
                            Direction::Inbound,
                            "parse_error",
                            "Failed to parse MCP response",
                        )
                        .trace(trace_id)
                        .extra("tool_name", Some("request_file_process"))
                        .emit();
                    }
                }
            }
        }
    }

    ChatResponse {
        response: response_text,
        elicitation,
    }
}

/// The upload mode is ultimately decided by the attachment status, whatever
/// the model asked for.
fn effective_mode(requested: Option<&str>, has_attached_file: bool) -> &'static str {
    let requested = requested.unwrap_or("ui");
    if has_attached_file && requested != "stream" {
        "stream"
    } else if !has_attached_file && requested != "ui" {
        "ui"
    } else if requested == "stream" {
        "stream"
    } else {
        "ui"
    }
}

fn system_prompt(has_attached_file: bool) -> String {
    let session_status = if has_attached_file {
        "YES - use mode='stream'"
    } else {
        "NO - use mode='ui'"
    };

    format!(
        "You are a helpful assistant that can help users upload and process files.\n\
         \n\
         IMPORTANT RULES:\n\
         1. When the user wants to upload or process a file, use the request_file_process tool. \
         The tool will return an upload URL.\n\
         \n\
         2. The tool accepts a mode parameter:\n\
         \x20  - \"stream\" mode: Use this when a file is ALREADY ATTACHED in the client. \
         The client will automatically upload it.\n\
         \x20  - \"ui\" mode: Use this when NO FILE is attached. The client will automatically \
         open a file picker.\n\
         \n\
         3. CURRENT SESSION STATUS:\n\
         \x20  - File attached: {session_status}\n\
         \n\
         4. If a file is attached (has_attached_file=True), ALWAYS use mode=\"stream\" - do NOT \
         ask the user to attach a file.\n\
         \n\
         5. If no file is attached (has_attached_file=False), use mode=\"ui\" - the file picker \
         will open automatically, no need to ask the user to do anything.\n\
         \n\
         6. The client will handle streaming the file directly to the upload URL provided by the \
         tool - you don't need to handle the file data.\n\
         \n\
         7. When a file is attached, be direct and process it immediately. When no file is \
         attached, use mode=\"ui\" and the file picker will open automatically."
    )
}

/// Keyword fallback used when no API key is configured.
fn fallback_response(message: &str) -> ChatResponse {
    let lowered = message.to_lowercase();
    let mentions_file =
        lowered.contains("file") || lowered.contains("process") || lowered.contains("upload");

    let response = if mentions_file {
        "Please attach a file with /attach <path>, then send your message to process it."
    } else {
        "Hello! Say 'process file' or 'upload file' to start a file upload. \
         Note: OpenAI API key not configured."
    };

    ChatResponse {
        response: response.to_string(),
        elicitation: None,
    }
}

/// Call the MCP tool over HTTP JSON-RPC: initialize, then `tools/call`.
async fn call_mcp_tool(
    state: &AiState,
    message: &str,
    mode: &str,
    trace_id: &TraceId,
) -> Result<Value, reqwest::Error> {
    let init_id = state.next_request_id();

    FlowRecord::new(
        "MCP_CLIENT",
        Direction::Outbound,
        "mcp_initialize",
        "Initializing MCP connection",
    )
    .trace(trace_id)
    .extra("request_id", Some(init_id))
    .emit();

    state
        .http
        .post(&state.mcp_server_url)
        .header(TRACE_HEADER, trace_id.as_str())
        .json(&json!({
            "jsonrpc": "2.0",
            "id": init_id,
            "method": "initialize",
            "params": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "elicitation": { "url": {}, "form": {} } },
                "clientInfo": { "name": "ai-service", "version": env!("CARGO_PKG_VERSION") }
            }
        }))
        .send()
        .await?;

    let call_id = state.next_request_id();
    let started = Instant::now();

    FlowRecord::new(
        "MCP_CLIENT",
        Direction::Outbound,
        "tool_call",
        "Calling MCP tool: request_file_process",
    )
    .trace(trace_id)
    .extra("request_id", Some(call_id))
    .extra("tool_name", Some("request_file_process"))
    .emit();

    let response: Value = state
        .http
        .post(&state.mcp_server_url)
        .header(TRACE_HEADER, trace_id.as_str())
        .json(&json!({
            "jsonrpc": "2.0",
            "id": call_id,
            "method": "tools/call",
            "params": {
                "name": "request_file_process",
                "arguments": { "message": message, "mode": mode }
            }
        }))
        .send()
        .await?
        .json()
        .await?;

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let event = match response.get("error") {
        Some(error) if error.get("code").and_then(Value::as_i64) == Some(ELICITATION_REQUIRED) => {
            "elicitation_required"
        }
        Some(_) => "tool_error",
        None => "tool_response",
    };
    FlowRecord::new(
        "MCP_CLIENT",
        Direction::Inbound,
        event,
        "Received tool response from MCP server",
    )
    .trace(trace_id)
    .extra("request_id", Some(call_id))
    .extra("duration_ms", Some(format!("{duration_ms:.2}")))
    .emit();

    Ok(response)
}

/// What an MCP `tools/call` reply means for the chat response.
#[derive(Debug, PartialEq)]
enum McpOutcome {
    UrlElicitation { url: String, message: String },
    StreamUpload { url: String, payload: Value },
    ToolError(String),
    Unrecognized,
}

fn interpret_mcp_response(response: &Value, tool_message: &str) -> McpOutcome {
    if let Some(error) = response.get("error") {
        let code = error.get("code").and_then(Value::as_i64);
        if code == Some(ELICITATION_REQUIRED) {
            let data = error.get("data").cloned().unwrap_or(json!({}));
            if data.get("mode").and_then(Value::as_str) == Some("url") {
                return McpOutcome::UrlElicitation {
                    url: data
                        .get("url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    message: data
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or(tool_message)
                        .to_string(),
                };
            }
            return McpOutcome::ToolError(format!(
                "Unexpected elicitation mode: {:?}",
                data.get("mode")
            ));
        }
        return McpOutcome::ToolError(
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
        );
    }

    let text = response
        .pointer("/result/content/0/text")
        .and_then(Value::as_str);
    if let Some(text) = text {
        if let Ok(payload) = serde_json::from_str::<Value>(text) {
            if payload.get("type").and_then(Value::as_str) == Some("stream_upload") {
                let url = payload
                    .get("url")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return McpOutcome::StreamUpload { url, payload };
            }
        }
    }

    McpOutcome::Unrecognized
}

async fn elicitation_complete(
    headers: HeaderMap,
    Json(data): Json<Value>,
) -> Json<Value> {
    let trace_id = super::trace_from_headers(&headers);
    let file_id = data
        .get("file_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    FlowRecord::new(
        "AI_SERVICE",
        Direction::Inbound,
        "elicitation_complete",
        "Elicitation completed: file uploaded",
    )
    .trace(&trace_id)
    .extra("file_id", Some(file_id))
    .emit();

    Json(json!({ "status": "success", "message": "File upload completed" }))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max).collect();
        format!("{prefix}...")
    }
}
