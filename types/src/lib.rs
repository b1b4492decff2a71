//! Wire types shared by the strassen server and its clients.
//!
//! A session carries exactly two frames: the client's [`MultiplyRequest`]
//! and, on success, the server's [`MultiplyResponse`]. Each frame is a
//! 4-byte big-endian length followed by a protobuf-encoded message.

mod codec;
mod error;
pub mod matrix;

pub use codec::{DEFAULT_MAX_FRAME_BYTES, read_frame, write_frame};
pub use error::FrameError;
pub use matrix::{MatrixProto, MultiplyRequest, MultiplyResponse};
