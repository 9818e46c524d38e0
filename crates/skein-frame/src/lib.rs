//! Length-prefixed, object-id tagged framing for skein.
//!
//! Every message on the wire is framed with:
//! - A 4-byte big-endian total length (header included)
//! - A 4-byte big-endian object id chosen by the sender
//!
//! The payload is the positional encoding of a [`Packet`]: an `i64`
//! timestamp followed by the application value. Reads are exact; callers
//! never see partial frames.

pub mod codec;
pub mod error;
pub mod packet;
pub mod reader;
pub mod writer;

pub use codec::{encode_frame, parse_header, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use error::{FrameError, Result};
pub use packet::Packet;
pub use reader::FrameReader;
pub use writer::FrameWriter;
