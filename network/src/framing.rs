//! Length-prefixed framing: every packet is a 4-byte big-endian length
//! followed by that many bytes.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::NetworkError;

/// Idle limit for a single frame read.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn write_framed<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), NetworkError> {
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. Fails with `Closed` on a clean EOF before the length
/// prefix and with `FrameTooLarge` when the prefix exceeds `max_size`.
pub async fn read_framed<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>, NetworkError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(NetworkError::Closed)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_size {
        return Err(NetworkError::FrameTooLarge(len));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// [`read_framed`] bounded by [`READ_TIMEOUT`].
pub async fn read_framed_timeout<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Vec<u8>, NetworkError> {
    tokio::time::timeout(READ_TIMEOUT, read_framed(reader, max_size))
        .await
        .map_err(|_| NetworkError::Timeout)?
}
