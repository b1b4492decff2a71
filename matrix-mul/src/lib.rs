//! Client for the strassen matrix chain server.
//!
//! `matrix-mul` sends an ordered list of square matrices to a
//! `strassen-server` and receives their product. Each call opens its own
//! session; a server that closes the connection without answering is
//! reported as an error.
//!
//! # Example
//!
//! ```no_run
//! use matrix_mul::MatrixMul;
//! use strassen::Matrix;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mm = MatrixMul::connect("localhost:5556").await?;
//!
//!     let a = Matrix::from_rows(vec![vec![1, 2], vec![3, 4]])?;
//!     let b = Matrix::from_rows(vec![vec![5, 6], vec![7, 8]])?;
//!
//!     let result = mm.multiply_chain(&[a, b]).await?;
//!     assert_eq!(result.to_rows(), vec![vec![19, 22], vec![43, 50]]);
//!
//!     Ok(())
//! }
//! ```

mod error;
mod matrix_mul;

pub use error::Error;
pub use matrix_mul::{MatrixMul, ServerAddr, random_matrix};
