// ABOUTME: Wire-level frame transport
// ABOUTME: Reads/writes fixed-size little-endian f32 PCM frames and the one-shot name handshake

use crate::error::Error;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Sample rate in Hz
pub const SAMPLE_RATE: u32 = 48_000;
/// Sample frames per audio buffer
pub const FRAMES_PER_BUFFER: usize = 1024;
/// Channel count (mono)
pub const CHANNELS: usize = 1;
/// Samples per wire frame
pub const SAMPLES_PER_FRAME: usize = FRAMES_PER_BUFFER * CHANNELS;
/// Bytes per wire frame (f32 little-endian samples)
pub const FRAME_BYTES: usize = SAMPLES_PER_FRAME * 4;
/// Maximum handshake name length in bytes
pub const MAX_NAME_BYTES: usize = 256;

/// One audio frame: exactly [`SAMPLES_PER_FRAME`] mono samples.
///
/// `Arc`-backed so broadcast fan-out clones are refcount bumps, not sample
/// copies.
pub type AudioFrame = Arc<[f32]>;

/// Read exactly one audio frame from the stream.
///
/// The wire carries no length prefix, so frame boundaries are implicit:
/// this reassembles partial TCP reads until a whole frame has arrived.
/// Returns `Ok(None)` on an orderly close at a frame boundary; a close
/// mid-frame is an `UnexpectedEof` error.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<AudioFrame>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; FRAME_BYTES];
    let mut filled = 0;
    while filled < FRAME_BYTES {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            ));
        }
        filled += n;
    }

    let samples: Vec<f32> = buf
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Some(samples.into()))
}

/// Write one audio frame to the stream.
pub async fn write_frame<W>(writer: &mut W, samples: &[f32]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug_assert_eq!(samples.len(), SAMPLES_PER_FRAME);
    let mut buf = Vec::with_capacity(samples.len() * 4);
    for sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    writer.write_all(&buf).await
}

/// Read the peer's display name: whatever bytes arrive in one receive
/// call, capped at [`MAX_NAME_BYTES`], interpreted as UTF-8.
///
/// Zero bytes (peer closed without identifying), invalid UTF-8 and
/// all-whitespace names are all handshake failures.
pub async fn read_name<R>(reader: &mut R) -> crate::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_NAME_BYTES];
    let n = reader
        .read(&mut buf)
        .await
        .map_err(|e| Error::Handshake(format!("read failed: {e}")))?;
    if n == 0 {
        return Err(Error::Handshake(
            "peer closed before sending a name".to_string(),
        ));
    }

    let name = std::str::from_utf8(&buf[..n])
        .map_err(|_| Error::Handshake("name is not valid UTF-8".to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Handshake("empty name".to_string()));
    }
    Ok(name.to_string())
}

/// Send this side's display name as the first bytes on the connection.
pub async fn write_name<W>(writer: &mut W, name: &str) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Handshake("empty name".to_string()));
    }
    if trimmed.len() > MAX_NAME_BYTES {
        return Err(Error::Handshake(format!(
            "name exceeds {MAX_NAME_BYTES} bytes"
        )));
    }
    writer
        .write_all(trimmed.as_bytes())
        .await
        .map_err(|e| Error::Handshake(format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Handshake(format!("write failed: {e}")))?;
    Ok(())
}
