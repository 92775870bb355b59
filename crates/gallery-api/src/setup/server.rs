//! Server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use gallery_core::Config;
use gallery_worker::MediaConversionQueue;
use std::sync::Arc;

/// Start the server with graceful shutdown. The conversion worker is stopped
/// once the listener has drained.
pub async fn start_server(
    config: &Config,
    app: Router,
    queue: Arc<MediaConversionQueue>,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.base.server_port);
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        public_host_url = %config.hub.public_host_url,
        app_path = %config.hub.app_path,
        ffmpeg_path = %config.media_queue.ffmpeg_path,
        poll_interval_ms = config.media_queue.poll_interval_ms,
        retention_days = config.media_queue.retention_days,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    queue.shutdown().await;
    gallery_infra::shutdown_telemetry().await;

    Ok(())
}

/// Signal handler for graceful shutdown
///
/// Listens for Ctrl+C (SIGINT) and SIGTERM.
///
/// # Panics
/// Panics if a signal handler cannot be installed (unrecoverable system error).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
