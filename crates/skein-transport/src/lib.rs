//! Async TCP transport for skein.
//!
//! This is the lowest layer of skein. It owns socket setup only:
//! - binding a listening endpoint and accepting connections
//! - connecting to a remote endpoint
//! - splitting a connected stream into independently owned halves
//!
//! Everything else (framing, codecs, dispatch) builds on the [`Stream`]
//! type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{SocketHandle, Stream};
pub use tcp::TcpEndpoint;
