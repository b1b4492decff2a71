//! Client side of a matrix chain session.

use rand::Rng;
use strassen::Matrix;
use strassen_types::{
    DEFAULT_MAX_FRAME_BYTES, MultiplyRequest, MultiplyResponse, read_frame, write_frame,
};
use tokio::net::TcpStream;

use crate::Error;

/// One connection to a strassen server.
///
/// The server answers exactly one request per connection, so
/// [`MatrixMul::multiply_chain`] consumes the client.
pub struct MatrixMul {
    stream: TcpStream,
    max_frame_bytes: usize,
}

impl MatrixMul {
    /// Connects to a strassen server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Server address (e.g., `"localhost:5556"`)
    pub async fn connect(addr: impl Into<ServerAddr>) -> Result<Self, Error> {
        let addr = addr.into();
        let stream = TcpStream::connect(addr.0.as_str()).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        })
    }

    /// Sets the largest response frame this client accepts.
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Sends `matrices` and waits for their left-to-right product.
    ///
    /// A connection closed by the server before a response arrives is
    /// reported as [`Error::ConnectionClosed`].
    pub async fn multiply_chain(mut self, matrices: &[Matrix]) -> Result<Matrix, Error> {
        let request = MultiplyRequest::from_matrices(matrices);
        write_frame(&mut self.stream, &request).await?;

        let response: MultiplyResponse = read_frame(&mut self.stream, self.max_frame_bytes).await?;
        let result = response.result.ok_or(Error::EmptyResponse)?;
        Ok(Matrix::try_from(result)?)
    }
}

/// Server address wrapper for type-safe connection.
#[derive(Clone, Debug)]
pub struct ServerAddr(pub String);

impl From<String> for ServerAddr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ServerAddr {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<std::net::SocketAddr> for ServerAddr {
    fn from(addr: std::net::SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

/// Fills a `size`×`size` matrix with values in `0..10`.
pub fn random_matrix(size: usize, rng: &mut impl Rng) -> Matrix {
    let values = (0..size * size).map(|_| rng.gen_range(0..10)).collect();
    match Matrix::from_vec(size, values) {
        Ok(m) => m,
        Err(_) => unreachable!("generated exactly size * size values"),
    }
}
