//! MCP protocol server entrypoint

use filechat::config::McpServerConfig;
use filechat::services::mcp;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filechat=info,flow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = McpServerConfig::from_env();
    tracing::info!(
        port = config.port,
        file_api_upload_url = %config.file_api_upload_url,
        "mcp-server starting"
    );

    let app = mcp::router(&config).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("mcp-server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
