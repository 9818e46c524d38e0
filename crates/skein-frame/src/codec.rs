use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Deserialize;

use crate::error::{FrameError, Result};
use crate::packet::Packet;

/// Frame header: total length (4) + object id (4) = 8 bytes.
pub const HEADER_SIZE: usize = skein_codec::HEADER_SIZE;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A framed message tagged with the sender's object id.
///
/// The object id is a routing key chosen by the sender. Nothing checks it
/// against the payload's actual type; decoding with the wrong type fails with
/// a codec error or yields garbage values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub object_id: u32,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(object_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            object_id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Decode the payload as a `Packet<T>`.
    pub fn packet<'a, T>(&'a self) -> Result<Packet<T>>
    where
        T: Deserialize<'a>,
    {
        Packet::decode(&self.payload)
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────────────┐
/// │ Length (4B)  │ Object id    │ Payload                  │
/// │ BE, includes │ (4B BE)      │ (Length - 8 bytes)       │
/// │ the header   │              │                          │
/// └──────────────┴──────────────┴──────────────────────────┘
/// ```
pub fn encode_frame(object_id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let max = u32::MAX as usize - HEADER_SIZE;
    if payload.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32((HEADER_SIZE + payload.len()) as u32);
    dst.put_u32(object_id);
    dst.put_slice(payload);
    Ok(())
}

/// Parse a frame header into `(object_id, payload_len)`.
pub fn parse_header(header: &[u8; HEADER_SIZE], max_payload: usize) -> Result<(u32, usize)> {
    let mut header = &header[..];
    let total = header.get_u32();
    let object_id = header.get_u32();

    let payload_len = (total as usize)
        .checked_sub(HEADER_SIZE)
        .ok_or(FrameError::InvalidLength(total))?;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    Ok((object_id, payload_len))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
