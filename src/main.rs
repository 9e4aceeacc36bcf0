//! filechat - terminal chat client
//!
//! Drives the upload/elicitation orchestrator against a running backend
//! triad (ai-service, mcp-server, file-api).

use filechat::config::ClientConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The terminal belongs to the UI, so logs go to a file.
    let log_path = std::env::var("FILECHAT_LOG").unwrap_or_else(|_| "filechat.log".to_string());
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filechat=info,flow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false),
        )
        .init();

    let config = ClientConfig::from_env();
    tracing::info!(ai_service_url = %config.ai_service_url, "filechat starting");

    filechat::tui::run(config).await?;
    Ok(())
}
