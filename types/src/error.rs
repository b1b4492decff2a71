//! Error types for the wire format.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,

    #[error("malformed frame: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },

    #[error("invalid matrix: {0}")]
    InvalidMatrix(#[from] strassen::Error),
}
