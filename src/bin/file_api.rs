//! File-storage service entrypoint

use filechat::config::FileApiConfig;
use filechat::services::file_api;
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

    let config = FileApiConfig::from_env();
    tracing::info!(
        port = config.port,
        upload_dir = %config.upload_dir.display(),
        "file-api starting"
    );

    let app = file_api::router(&config).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("file-api listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
