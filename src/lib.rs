//! TCP server that multiplies chains of square matrices.
//!
//! A client opens a connection, sends one
//! [`MultiplyRequest`](strassen_types::MultiplyRequest) holding an ordered list
//! of equally sized, power-of-two matrices, and receives one
//! [`MultiplyResponse`](strassen_types::MultiplyResponse) with their product.
//! Any failure closes the connection without a response.
//!
//! Two pools bound the work: `connection_slots` sessions are served at once,
//! and all of them share one Strassen worker pool.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strassen::WorkStealingScheduler;
//! use strassen_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let scheduler = Arc::new(WorkStealingScheduler::new(config.workers)?);
//!     let listener = tokio::net::TcpListener::bind(config.bind).await?;
//!
//!     Server::new(&config, scheduler)?.serve(listener).await?;
//!     Ok(())
//! }
//! ```

pub mod acceptor;
pub mod config;
mod error;
pub mod handler;
pub mod session;

pub use acceptor::Server;
pub use config::ServerConfig;
pub use error::Error;
pub use handler::ConnectionHandler;
pub use session::{Session, SessionState};
