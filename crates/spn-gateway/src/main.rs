//! # spn-gateway: Binary Entry Point
//!
//! Starts the storage-provider HTTP gateway. Configuration comes from the
//! environment; see [`spn_gateway::config`].

use spn_gateway::config::{AppConfig, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);
    tracing::debug!(?config, "configuration loaded");

    // Install the recorder before any request or protocol metric is emitted.
    let _ = spn_gateway::middleware::metrics::prometheus_handle();

    let state = spn_gateway::bootstrap::bootstrap(&config).await.map_err(|e| {
        tracing::error!("bootstrap failed: {e}");
        e
    })?;
    let app = spn_gateway::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("storage provider gateway listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
