//! MCP protocol server
//!
//! A single JSON-RPC 2.0 endpoint exposing the `request_file_process` tool.
//! `mode:"ui"` calls cannot complete until the user picks a file, so they
//! return `URLElicitationRequiredError` (-32042) with the upload URL in the
//! error data; `mode:"stream"` calls return the upload URL directly.

use super::{health, trace_from_headers, ApiError};
use crate::config::McpServerConfig;
use crate::flowlog::{Direction, FlowRecord, TraceId};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// JSON-RPC error code for `URLElicitationRequiredError`.
pub const ELICITATION_REQUIRED: i64 = -32042;
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Clone)]
struct McpState {
    upload_url: String,
}

pub fn router(config: &McpServerConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/health", get(health))
        .layer(cors)
        .with_state(McpState {
            upload_url: config.file_api_upload_url.clone(),
        })
}

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: &Value, code: i64, message: String, data: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({ "jsonrpc": "2.0", "id": id, "error": error })
}

async fn handle_rpc(
    State(state): State<McpState>,
    headers: HeaderMap,
    Json(request): Json<RpcRequest>,
) -> Result<Json<Value>, ApiError> {
    let trace_id = trace_from_headers(&headers);

    FlowRecord::new(
        "MCP_SERVER",
        Direction::Inbound,
        "mcp_request",
        format!("Received MCP request: {}", request.method),
    )
    .trace(&trace_id)
    .extra("request_id", Some(&request.id))
    .emit();

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(&request, &trace_id),
        "tools/list" => handle_tools_list(&request, &trace_id),
        "tools/call" => handle_tools_call(&state, &request, &trace_id),
        "elicitation/accept" | "elicitation/decline" => {
            FlowRecord::new(
                "MCP_SERVER",
                Direction::Inbound,
                "elicitation_ack",
                format!("Elicitation {} by client", request.method.trim_start_matches("elicitation/")),
            )
            .trace(&trace_id)
            .emit();
            rpc_result(&request.id, json!({}))
        }
        other => rpc_error(
            &request.id,
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
            None,
        ),
    };

    Ok(Json(response))
}

fn handle_initialize(request: &RpcRequest, trace_id: &TraceId) -> Value {
    let protocol = request
        .params
        .get("protocolVersion")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    FlowRecord::new(
        "MCP_SERVER",
        Direction::Outbound,
        "mcp_initialize",
        format!("MCP client initialized with protocol {protocol}"),
    )
    .trace(trace_id)
    .emit();

    rpc_result(
        &request.id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "mcp-file-server", "version": env!("CARGO_PKG_VERSION") }
        }),
    )
}

fn handle_tools_list(request: &RpcRequest, trace_id: &TraceId) -> Value {
    FlowRecord::new(
        "MCP_SERVER",
        Direction::Outbound,
        "tools_list",
        "Returning available tools list",
    )
    .trace(trace_id)
    .emit();

    rpc_result(
        &request.id,
        json!({
            "tools": [{
                "name": "request_file_process",
                "description": "Initiates a file processing request that requires user to upload a file",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "message": {
                            "type": "string",
                            "description": "Message to display to the user"
                        },
                        "mode": {
                            "type": "string",
                            "enum": ["ui", "stream"],
                            "description": "Upload mode: 'ui' for the client's file picker, 'stream' for direct streaming to the API"
                        }
                    },
                    "required": ["message", "mode"]
                }
            }]
        }),
    )
}

fn handle_tools_call(state: &McpState, request: &RpcRequest, trace_id: &TraceId) -> Value {
    let tool_name = request
        .params
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let arguments = request.params.get("arguments").cloned().unwrap_or(json!({}));

    FlowRecord::new(
        "MCP_SERVER",
        Direction::Inbound,
        "tool_call",
        format!("Tool call received: {tool_name}"),
    )
    .trace(trace_id)
    .extra("tool_name", Some(tool_name))
    .emit();

    if tool_name != "request_file_process" {
        return rpc_error(
            &request.id,
            METHOD_NOT_FOUND,
            format!("Unknown tool: {tool_name}"),
            None,
        );
    }

    let message = arguments
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Please upload a file for processing");
    let mode = arguments
        .get("mode")
        .and_then(Value::as_str)
        .unwrap_or("ui");
    let upload_url = state.upload_url.as_str();

    match mode {
        "stream" => {
            FlowRecord::new(
                "MCP_SERVER",
                Direction::Outbound,
                "stream_upload_url",
                "Returning direct stream upload URL",
            )
            .trace(trace_id)
            .extra("tool_name", Some(tool_name))
            .extra("upload_url", Some(upload_url))
            .emit();

            let payload = json!({
                "type": "stream_upload",
                "mode": "stream",
                "message": message,
                "url": upload_url,
                "metadata": {
                    "description": "Direct file upload endpoint",
                    "method": "POST",
                    "contentType": "multipart/form-data"
                }
            });

            rpc_result(
                &request.id,
                json!({
                    "content": [{ "type": "text", "text": payload.to_string() }],
                    "isError": false
                }),
            )
        }
        _ => {
            // UI mode: the call cannot proceed until the user picks a file,
            // so answer with the URL-mode elicitation error.
            FlowRecord::new(
                "MCP_SERVER",
                Direction::Outbound,
                "elicitation_url_required",
                "Returning URL-mode elicitation (URLElicitationRequiredError)",
            )
            .trace(trace_id)
            .extra("tool_name", Some(tool_name))
            .extra("upload_url", Some(upload_url))
            .emit();

            rpc_error(
                &request.id,
                ELICITATION_REQUIRED,
                "URLElicitationRequiredError".to_string(),
                Some(json!({
                    "mode": "url",
                    "message": message,
                    "url": upload_url
                })),
            )
        }
    }
}
