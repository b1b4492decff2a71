//! Error types for the server.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] strassen_types::FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("computation failed: {0}")]
    Compute(#[from] strassen::Error),

    #[error("computation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("server is shutting down")]
    ShuttingDown,

    #[error("computation exceeded {0:?}")]
    TimedOut(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),
}
