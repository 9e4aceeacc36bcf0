//! Environment-driven configuration for each binary.
//!
//! Each struct is read once in `main` and passed down explicitly, so every
//! component can be constructed against a mock endpoint in tests.

/// Chat client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the AI service, no trailing slash.
    pub ai_service_url: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let ai_service_url = std::env::var("AI_SERVICE_URL").unwrap_or_else(|_| {
            let port = std::env::var("AI_SERVICE_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8000);
            format!("http://localhost:{port}")
        });

        Self {
            ai_service_url: ai_service_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn new(ai_service_url: impl Into<String>) -> Self {
        let ai_service_url = ai_service_url.into();
        Self {
            ai_service_url: ai_service_url.trim_end_matches('/').to_string(),
        }
    }
}

/// AI orchestration service configuration.
#[derive(Debug, Clone)]
pub struct AiServiceConfig {
    pub port: u16,
    /// Full URL of the MCP server's JSON-RPC endpoint.
    pub mcp_server_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
}

impl AiServiceConfig {
    pub fn from_env() -> Self {
        let mcp_port = std::env::var("MCP_SERVER_PORT").unwrap_or_else(|_| "8002".to_string());
        Self {
            port: port_from_env(8000),
            mcp_server_url: format!("http://localhost:{mcp_port}/mcp"),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        }
    }
}

/// MCP protocol server configuration.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    pub port: u16,
    /// Upload URL handed out in elicitation responses.
    pub file_api_upload_url: String,
}

impl McpServerConfig {
    pub fn from_env() -> Self {
        let file_api_port = std::env::var("FILE_API_PORT").unwrap_or_else(|_| "8001".to_string());
        Self {
            port: port_from_env(8002),
            file_api_upload_url: format!("http://localhost:{file_api_port}/upload"),
        }
    }
}

/// File-storage service configuration.
#[derive(Debug, Clone)]
pub struct FileApiConfig {
    pub port: u16,
    pub upload_dir: std::path::PathBuf,
}

impl FileApiConfig {
    pub fn from_env() -> Self {
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        Self {
            port: port_from_env(8001),
            upload_dir: upload_dir.into(),
        }
    }
}

fn port_from_env(default: u16) -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(default)
}
