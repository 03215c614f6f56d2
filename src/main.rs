//! voice-presence-daemon: background daemon behind the in-game voice overlay
//!
//! The game host reports who is talking, the live roster and chat commands
//! over a Unix socket; the overlay subscribes on the same socket and draws
//! whatever indicators the daemon tells it to.
//!
//! Provides:
//! - Presence tracking with a grace window per participant
//! - Fixed-cadence reconciliation of one indicator per active speaker
//! - `/voice` commands and hotkeys backed by persisted settings
//! - IPC for status queries and indicator notifications

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use voice_presence::config::Config;
use voice_presence::indicator::{probe_image_asset, ModePolicy};
use voice_presence::ipc::Server;
use voice_presence::lifecycle::ShutdownSignal;
use voice_presence::service::EngineService;
use voice_presence::settings::SettingsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voice-presence-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.data_dir, "configuration loaded");

    // Register signal handlers before anything else can block
    let mut shutdown = ShutdownSignal::new()?;

    let settings = SettingsStore::open(&config.settings_path);

    let image_available = probe_image_asset(&config.image_path);

    let (service, handle) = EngineService::new(
        &config.timing,
        ModePolicy::new(image_available),
        settings,
    );

    // Engine service stops on this signal, after releasing every indicator
    let (service_shutdown_tx, service_shutdown_rx) = broadcast::channel(1);
    let mut service_task = tokio::spawn(service.run(service_shutdown_rx));

    let server = Server::new(&config.socket_path, handle)?;

    info!("daemon initialized, entering main loop");

    let mut service_done = false;
    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // The service only exits on its own if every handle is gone
        result = &mut service_task => {
            service_done = true;
            if let Err(e) = result {
                error!(?e, "engine service task failed");
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if !service_done {
        let _ = service_shutdown_tx.send(());
        if let Err(e) = service_task.await {
            error!(?e, "engine service task failed");
        }
    }
    server.shutdown().await;

    info!("voice-presence-daemon stopped");

    Ok(())
}
