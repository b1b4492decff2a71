//! Error types for matrix-mul operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Frame(strassen_types::FrameError),

    #[error("server closed the connection without a result")]
    ConnectionClosed,

    #[error("server response carried no matrix")]
    EmptyResponse,

    #[error("invalid matrix: {0}")]
    Matrix(#[from] strassen::Error),
}

impl From<strassen_types::FrameError> for Error {
    fn from(err: strassen_types::FrameError) -> Self {
        match err {
            strassen_types::FrameError::Closed => Error::ConnectionClosed,
            other => Error::Frame(other),
        }
    }
}
