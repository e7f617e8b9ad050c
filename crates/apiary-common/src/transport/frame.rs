use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::error::{ApiaryError, Result};

/// Maximum frame payload size (16 MB).
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Writes one frame: `[4-byte length as u32 big-endian] + [data]`.
pub async fn write_frame<S>(stream: &mut S, data: &[u8]) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_BYTES {
        return Err(ApiaryError::Protocol(format!(
            "frame of {} bytes exceeds the {} byte limit",
            data.len(),
            MAX_FRAME_BYTES
        )));
    }

    let len = data.len() as u32;
    stream
        .write_all(&len.to_be_bytes())
        .await
        .map_err(|e| ApiaryError::Connection(format!("failed to write frame length: {e}")))?;
    stream
        .write_all(data)
        .await
        .map_err(|e| ApiaryError::Connection(format!("failed to write frame body: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| ApiaryError::Connection(format!("failed to flush frame: {e}")))?;

    Ok(())
}

/// Reads one frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames. EOF in the middle of a frame, or a length prefix above
/// [`MAX_FRAME_BYTES`], is an error; the caller is expected to drop the
/// connection.
pub async fn read_frame<S>(stream: &mut S) -> Result<Option<Vec<u8>>>
where
    S: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => {
            return Err(ApiaryError::Connection(format!(
                "failed to read frame length: {e}"
            )))
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(ApiaryError::Protocol(format!(
            "frame of {len} bytes exceeds the {MAX_FRAME_BYTES} byte limit"
        )));
    }

    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|e| ApiaryError::Connection(format!("failed to read frame body: {e}")))?;

    Ok(Some(buf))
}
