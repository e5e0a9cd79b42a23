//! Region-Cast: serve a live view of a desktop screen region over HTTP.
//!
//! This is the app shell that wires together:
//! - Configuration (config.rs)
//! - Screen capture domain (capture/)
//! - Encoding and the MJPEG feed (stream.rs), status text (stats.rs)
//! - HTTP handlers (server.rs)

pub mod capture;
pub mod config;
pub mod server;
pub mod stats;
pub mod stream;

use capture::CaptureController;
use config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Entry point, called by the binary.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    log::info!("Region-Cast starting up");

    // Backend choice is frozen here for the life of the process.
    let grabber = capture::select_grabber(config.capture.backend);
    let controller = Arc::new(CaptureController::new(config.capture.clone(), grabber));

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    log::info!("Listening on http://{}", config.bind_address);
    log::info!("Live stream: http://{}/stream", config.bind_address);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown requested, closing live streams");
        signal.cancel();
    });

    server::serve(listener, Arc::clone(&controller), shutdown).await?;

    log::info!("Shutting down");
    controller.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
