//! Gambit Server
//!
//! The `gambit` binary: a chess relay served over WebSocket, configured from
//! defaults, `gambit.toml`, `GAMBIT_` environment variables and the command line.

pub mod cli;
pub mod config;
pub mod error;
pub mod websocket;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use gambit_chess::ChessRules;
use gambit_runtime::RelayBuilder;

pub use config::{ConfigError, ConfigOverrides, ServerAppConfig};
pub use error::{Result, ServerError};
pub use websocket::WebSocketServer;

/// Serve the relay until `shutdown_signal` resolves
pub async fn run(config: ServerAppConfig, shutdown_signal: impl Future<Output = ()>) -> Result<()> {
    let addr = config.bind_address()?;

    let mut handle = RelayBuilder::new(Arc::new(ChessRules::new()))
        .with_config(config.relay.clone())
        .start()?;

    let server = WebSocketServer::bind(addr, &handle, config.server.max_message_bytes).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.run(shutdown_rx));

    shutdown_signal.await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(err) = server_task.await {
        warn!(error = %err, "Server task ended abnormally");
    }
    handle.shutdown().await;
    Ok(())
}
