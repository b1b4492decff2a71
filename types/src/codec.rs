//! Length-prefixed framing for protobuf messages.

use std::io;

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::FrameError;

const HEADER_LEN: usize = 4;

/// Largest frame accepted unless the reader asks for another limit.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024 * 1024;

/// Encodes `message` and writes it as one frame.
pub async fn write_frame<W, M>(writer: &mut W, message: &M) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    M: Message,
{
    let body = message.encode_to_vec();
    let len = u32::try_from(body.len()).map_err(|_| FrameError::TooLarge {
        len: body.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and decodes it.
///
/// Returns [`FrameError::Closed`] if the peer closed before sending a
/// header, and [`FrameError::TooLarge`] without reading the body if the
/// announced length is above `max_len`.
pub async fn read_frame<R, M>(reader: &mut R, max_len: usize) -> Result<M, FrameError>
where
    R: AsyncRead + Unpin,
    M: Message + Default,
{
    let mut header = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(FrameError::Closed),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(M::decode(body.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MatrixProto, MultiplyRequest};
    use tokio::io::duplex;

    fn request() -> MultiplyRequest {
        MultiplyRequest {
            matrices: vec![MatrixProto {
                size: 2,
                values: vec![1, 2, 3, 4],
            }],
        }
    }

    #[tokio::test]
    async fn frame_roundtrip() {
        let (mut client, mut server) = duplex(1024);
        write_frame(&mut client, &request()).await.unwrap();
        let got: MultiplyRequest = read_frame(&mut server, DEFAULT_MAX_FRAME_BYTES)
            .await
            .unwrap();
        assert_eq!(got, request());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut client, mut server) = duplex(1024);
        write_frame(&mut client, &request()).await.unwrap();
        let err = read_frame::<_, MultiplyRequest>(&mut server, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { max: 4, .. }));
    }

    #[tokio::test]
    async fn closed_before_header() {
        let (client, mut server) = duplex(64);
        drop(client);
        let err = read_frame::<_, MultiplyRequest>(&mut server, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Closed));
    }

    #[tokio::test]
    async fn truncated_body_is_an_io_error() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&10u32.to_be_bytes()).await.unwrap();
        client.write_all(&[1, 2, 3]).await.unwrap();
        drop(client);
        let err = read_frame::<_, MultiplyRequest>(&mut server, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn garbage_body_fails_to_decode() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&3u32.to_be_bytes()).await.unwrap();
        client.write_all(&[0xff, 0xff, 0xff]).await.unwrap();
        let err = read_frame::<_, MultiplyRequest>(&mut server, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }
}
