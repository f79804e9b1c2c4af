//! Brama Control server
//!
//! Polls one Brama amplifier and serves its controls over HTTP + SSE.

use brama_control::adapters::{BramaAdapter, Startable};
use brama_control::{api, bus, config};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brama_control=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "Starting Brama Control v{} ({})",
        env!("BRAMA_VERSION"),
        env!("BRAMA_GIT_SHA")
    );

    // Load configuration
    let config = config::load_config()?;
    let amp_config = config.amp.context(
        "No amplifier configured: set BRAMA_HOST or [amp] host in the config file",
    )?;
    tracing::info!(
        "Configuration loaded, port: {}, amplifier: {}",
        config.port,
        amp_config.host
    );

    // Create event bus
    let bus = bus::create_bus();

    // First poll must succeed; an unreachable amplifier is a setup failure
    let amp = Arc::new(BramaAdapter::new(&amp_config, bus.clone())?);
    amp.start()
        .await
        .with_context(|| format!("Failed to set up amplifier at {}", amp_config.host))?;

    let state = api::AppState::new(amp.clone(), bus.clone());

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive()),
    );

    // Start server with graceful shutdown
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: stop polling
    tracing::info!("Shutting down...");
    bus.publish(bus::BusEvent::ShuttingDown {
        reason: Some("server stopped".to_string()),
    });
    amp.stop().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
