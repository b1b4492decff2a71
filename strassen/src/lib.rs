//! Parallel Strassen matrix multiplication.
//!
//! `strassen` multiplies square, power-of-two sized `i32` matrices with
//! Strassen's seven-product recursion. Every recursive step is described by a
//! plain [`MultiplyTask`] value; the [`StrassenEngine`] hands the seven child
//! tasks to a [`Scheduler`], which decides how they run.
//!
//! # Features
//!
//! - Work-stealing fork/join on a bounded `rayon` pool ([`WorkStealingScheduler`])
//! - Deterministic inline execution for tests and baselines ([`SequentialScheduler`])
//! - Left-to-right chain reduction ([`ChainMultiplier`])
//! - Cooperative cancellation through a shared [`CancelFlag`]
//!
//! Arithmetic wraps on overflow (two's complement, modulo 2^32), so the
//! Strassen result is bit-identical to the direct product.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use strassen::{CancelFlag, ChainMultiplier, Matrix, StrassenEngine, WorkStealingScheduler};
//!
//! # fn main() -> Result<(), strassen::Error> {
//! let scheduler = Arc::new(WorkStealingScheduler::new(2)?);
//! let chain = ChainMultiplier::new(StrassenEngine::new(64), scheduler);
//!
//! let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]])?;
//! let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]])?;
//!
//! let c = chain.reduce(vec![a, b], &CancelFlag::new())?;
//! assert_eq!(c.to_rows(), vec![vec![19, 22], vec![43, 50]]);
//! # Ok(())
//! # }
//! ```

mod cancel;
pub mod chain;
mod engine;
mod error;
mod matrix;
pub mod ops;
mod scheduler;

pub use cancel::CancelFlag;
pub use chain::ChainMultiplier;
pub use engine::{DEFAULT_THRESHOLD, MultiplyTask, StrassenEngine};
pub use error::Error;
pub use matrix::Matrix;
pub use scheduler::{Scheduler, SequentialScheduler, TaskHandle, WorkStealingScheduler};
