use std::io::ErrorKind;

use bytes::BytesMut;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::packet::Packet;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// Each write call puts the whole frame on the stream and flushes before
/// returning.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.object_id, frame.payload.as_ref()).await
    }

    /// Frame and send a raw payload under `object_id`.
    pub async fn send(&mut self, object_id: u32, payload: &[u8]) -> Result<()> {
        self.check_size(payload.len())?;

        self.buf.clear();
        encode_frame(object_id, payload, &mut self.buf)?;

        let buf = std::mem::take(&mut self.buf);
        let result = self.write_all(&buf).await;
        self.buf = buf;
        trace!(object_id, payload_len = payload.len(), "wrote frame");
        result
    }

    /// Encode `packet` with its frame header and send it.
    pub async fn write_packet<T: Serialize>(
        &mut self,
        object_id: u32,
        packet: &Packet<T>,
    ) -> Result<()> {
        let bytes = packet.encode(object_id)?;
        self.write_encoded(&bytes).await?;
        trace!(object_id, len = bytes.len(), "wrote packet");
        Ok(())
    }

    /// Send a frame that is already encoded, header included.
    pub async fn write_encoded(&mut self, frame: &[u8]) -> Result<()> {
        let payload_len = frame.len().checked_sub(HEADER_SIZE).ok_or_else(|| {
            FrameError::InvalidLength(u32::try_from(frame.len()).unwrap_or(u32::MAX))
        })?;
        self.check_size(payload_len)?;
        self.write_all(frame).await
    }

    /// Write raw bytes and flush.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await.map_err(map_write_error)?;
        self.flush().await
    }

    /// Flush the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await.map_err(map_write_error)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn check_size(&self, payload_len: usize) -> Result<()> {
        if payload_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }
}

fn map_write_error(err: std::io::Error) -> FrameError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => {
            FrameError::ConnectionClosed
        }
        _ => FrameError::Io(err),
    }
}
