use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use strassen::DEFAULT_THRESHOLD;
use strassen_types::DEFAULT_MAX_FRAME_BYTES;

use crate::Error;

pub const DEFAULT_PORT: u16 = 5556;
pub const DEFAULT_CONNECTION_SLOTS: usize = 10;
pub const DEFAULT_MAX_QUEUED_CONNECTIONS: usize = 1024;

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Server settings, read from flags or `STRASSEN_*` environment variables.
///
/// Computation and connection concurrency are sized separately: `workers`
/// bounds the Strassen pool shared by all sessions, `connection_slots`
/// bounds how many sessions are served at once.
#[derive(Debug, Clone, Parser)]
#[command(name = "strassen-server", version, about = "Multiplies matrix chains sent over TCP")]
pub struct ServerConfig {
    /// Address to listen on.
    #[arg(long, env = "STRASSEN_BIND", default_value_t = SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)))]
    pub bind: SocketAddr,

    /// Threads in the computation pool.
    #[arg(long, env = "STRASSEN_WORKERS", default_value_t = default_workers())]
    pub workers: usize,

    /// Sessions handled at the same time.
    #[arg(long, env = "STRASSEN_CONNECTION_SLOTS", default_value_t = DEFAULT_CONNECTION_SLOTS)]
    pub connection_slots: usize,

    /// Accepted sessions allowed to wait for a slot before new ones are dropped.
    #[arg(long, env = "STRASSEN_MAX_QUEUED", default_value_t = DEFAULT_MAX_QUEUED_CONNECTIONS)]
    pub max_queued_connections: usize,

    /// Side length at or below which the direct product is used.
    #[arg(long, env = "STRASSEN_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: usize,

    /// Largest request frame accepted, in bytes.
    #[arg(long, env = "STRASSEN_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// Cancel a session whose computation runs longer than this.
    #[arg(long, env = "STRASSEN_COMPUTE_TIMEOUT_MS")]
    pub compute_timeout_ms: Option<u64>,

    /// Re-run every request with the direct product and log the speedup.
    #[arg(long, env = "STRASSEN_VERIFY_SEQUENTIAL")]
    pub verify_sequential: bool,
}

impl ServerConfig {
    pub fn compute_timeout(&self) -> Option<Duration> {
        self.compute_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let positive = [
            ("workers", self.workers),
            ("connection-slots", self.connection_slots),
            ("threshold", self.threshold),
            ("max-frame-bytes", self.max_frame_bytes),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if self.compute_timeout_ms == Some(0) {
            return Err(Error::Config("compute-timeout-ms must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            workers: default_workers(),
            connection_slots: DEFAULT_CONNECTION_SLOTS,
            max_queued_connections: DEFAULT_MAX_QUEUED_CONNECTIONS,
            threshold: DEFAULT_THRESHOLD,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            compute_timeout_ms: None,
            verify_sequential: false,
        }
    }
}
