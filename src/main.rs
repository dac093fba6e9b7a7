//! pulse-gateway server entry point.
//!
//! Starts the Axum HTTP server with the SSE subscribe endpoint and the
//! REST publish/diagnostics endpoints.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pulse_gateway::app_state::AppState;
use pulse_gateway::config::{GatewayConfig, LogFormat};
use pulse_gateway::server::{build_app, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting pulse-gateway");

    // One registry for the whole process, closed through this token
    let shutdown = CancellationToken::new();
    let app_state = AppState::new(&config, shutdown.clone());
    let app = build_app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}
