//! Error types for strassen operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("matrix size mismatch: left is {left}x{left}, right is {right}x{right}")]
    ShapeMismatch { left: usize, right: usize },

    #[error("matrix is not square")]
    NotSquare,

    #[error("matrix side length {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("cannot reduce an empty matrix sequence")]
    EmptySequence,

    #[error("computation cancelled")]
    Cancelled,

    #[error("task panicked: {0}")]
    TaskPanicked(String),

    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}
