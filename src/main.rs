//! Ender client - headless simulation core for the multiplayer trail game
//!
//! Binds a hero against the backend, then runs the fixed-step simulation:
//! scene stepping and trail emission locally, 1 Hz polling for authoritative
//! world deltas, reconciliation of remote heroes and walls. A forced reload
//! after outage recovery rebuilds the whole session from scratch.

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ender_client::config::Config;
use ender_client::game::{GameSession, SessionOutcome};
use ender_client::net::ApiClient;
use ender_client::render::NullSurface;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Ender client");
    info!("Backend: {}", config.server_url);

    let api = ApiClient::new(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // Sessions run back to back: a Reload outcome (outage recovery) tears
    // the world down and rebuilds it from a fresh hero fetch.
    loop {
        let session = GameSession::bootstrap(&config, api.clone())
            .await
            .context("failed to bind hero")?;
        let mut surface = NullSurface;

        match session.run(&mut surface, shutdown_rx.clone()).await {
            SessionOutcome::Reload => {
                info!("session reload requested, rebuilding world");
            }
            SessionOutcome::Shutdown => break,
        }
    }

    info!("Client shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
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
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
