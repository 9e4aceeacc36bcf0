//! AI orchestration service entrypoint

use filechat::config::AiServiceConfig;
use filechat::services::ai;
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

    let config = AiServiceConfig::from_env();
    tracing::info!(
        port = config.port,
        mcp_server_url = %config.mcp_server_url,
        model = %config.openai_model,
        "ai-service starting"
    );

    let app = ai::router(&config).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("ai-service listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
