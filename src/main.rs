//! remote-console: control client for a WebSocket-driven game console
//!
//! Keeps one connection to the console's `/ws` endpoint alive and turns
//! front-end input into the console's command vocabulary:
//! - Connection lifecycle with a constant-interval reconnect
//! - Press/release, impulse and toggle input adapters
//! - Voice transcripts mapped to commands, with duplicate suppression
//! - IPC server for UI front-ends (input requests, status notifications)
//!
//! Delivery is best effort: commands issued while disconnected are dropped
//! and reported, never queued.

mod command;
mod config;
mod connection;
mod controller;
mod debounce;
mod events;
mod input;
mod ipc;
mod lifecycle;
mod timers;
mod voice;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::connection::WsConnector;
use crate::controller::{Controller, ControllerHandle};
use crate::events::StatusReporter;
use crate::ipc::Server;
use crate::lifecycle::ShutdownSignal;
use crate::voice::{Recognizer, RemoteRecognizer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "remote-console starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    let endpoint = config.endpoint()?;
    info!(%endpoint, socket_path = ?config.socket_path, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Controller -> front-ends
    let status = StatusReporter::new(64);
    // Link tasks -> controller
    let (link_tx, link_rx) = mpsc::unbounded_channel();
    // IPC server -> controller
    let (control_tx, control_rx) = mpsc::channel(32);

    let connector = WsConnector::new(link_tx, config.connect_timeout);
    let recognizer: Option<Box<dyn Recognizer>> = if config.voice_enabled {
        Some(Box::new(RemoteRecognizer))
    } else {
        None
    };
    let controller = Controller::new(&config, endpoint, connector, recognizer, status.clone());

    let server = Server::new(&config.socket_path, ControllerHandle::new(control_tx), status)?;

    info!("client initialized, entering main loop");

    tokio::select! {
        _ = controller.run(control_rx, link_rx) => {
            info!("controller exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    info!("shutting down...");
    server.shutdown().await;
    info!("remote-console stopped");

    Ok(())
}
