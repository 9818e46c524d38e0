use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Application envelope carried in every frame payload.
///
/// Encoded positionally: the `i64` timestamp first, then the payload's
/// fields. The timestamp is taken when the packet is built, not when it is
/// sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet<T> {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub payload: T,
}

impl<T> Packet<T> {
    /// Wrap `payload`, stamping it with the current time.
    pub fn new(payload: T) -> Self {
        Self::with_timestamp(payload, now_millis())
    }

    pub fn with_timestamp(payload: T, timestamp: i64) -> Self {
        Self { timestamp, payload }
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Decode a frame payload (header already stripped).
    pub fn decode<'de>(payload: &'de [u8]) -> Result<Self>
    where
        T: Deserialize<'de>,
    {
        Ok(skein_codec::decode_no_metadata(payload)?)
    }
}

impl<T: Serialize> Packet<T> {
    /// Encode as a complete frame: header, timestamp, payload.
    pub fn encode(&self, object_id: u32) -> Result<Bytes> {
        Ok(skein_codec::encode(self, object_id)?)
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
