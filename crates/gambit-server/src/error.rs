//! Error handling for the Gambit server

use thiserror::Error;

use crate::config::ConfigError;

/// Server-specific error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Gambit relay error: {0}")]
    Gambit(#[from] gambit_core::GambitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
