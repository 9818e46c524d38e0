//! Compact positional binary codec for skein.
//!
//! Values are laid out field by field in declaration order, big-endian, with
//! no field names or type tags. Both peers must agree on the type; the bytes
//! alone do not describe it.
//!
//! Two layers are provided:
//! - [`Writer`] / [`Reader`]: a hand-driven binary cursor
//! - [`Encoder`] / [`Decoder`]: serde drivers for the cursor, so any
//!   `#[derive(Serialize, Deserialize)]` type can be encoded without per-type
//!   code
//!
//! With metadata, an encoding starts with an 8-byte header: the total length
//! (header included) and a caller-chosen object id, both u32.

pub mod de;
pub mod error;
pub mod reader;
pub mod ser;
pub mod writer;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub use de::Decoder;
pub use error::{CodecError, Result};
pub use reader::Reader;
pub use ser::Encoder;
pub use writer::{Writer, HEADER_SIZE, MAX_STRING_LEN};

/// Encode `value` behind an 8-byte length/object-id header.
pub fn encode<T>(value: &T, object_id: u32) -> Result<Bytes>
where
    T: ?Sized + Serialize,
{
    let mut writer = Writer::begin(object_id);
    value.serialize(&mut Encoder::new(&mut writer))?;
    let bytes = writer.bake()?;
    trace!(object_id, len = bytes.len(), "encoded value");
    Ok(bytes)
}

/// Encode `value` with no header.
pub fn encode_no_metadata<T>(value: &T) -> Result<Bytes>
where
    T: ?Sized + Serialize,
{
    let mut writer = Writer::new();
    value.serialize(&mut Encoder::new(&mut writer))?;
    writer.bake()
}

/// Decode a value produced by [`encode`], skipping its header.
///
/// The header is not checked against `bytes`; trailing bytes after the value
/// are ignored.
pub fn decode<'de, T>(bytes: &'de [u8]) -> Result<T>
where
    T: Deserialize<'de>,
{
    let reader = Reader::begin(bytes, true)?;
    T::deserialize(&mut Decoder::new(reader))
}

/// Decode a value produced by [`encode_no_metadata`].
pub fn decode_no_metadata<'de, T>(bytes: &'de [u8]) -> Result<T>
where
    T: Deserialize<'de>,
{
    T::deserialize(&mut Decoder::new(Reader::new(bytes)))
}
