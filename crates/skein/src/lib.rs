//! Typed, framed messaging over TCP.
//!
//! skein moves serde values between processes as length-prefixed frames
//! tagged with an application-chosen object id. Values are encoded
//! positionally: no field names, no type tags, just the fields in
//! declaration order.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listening and connecting
//! - [`codec`]: Positional binary codec over serde
//! - [`frame`]: Frame header, packets, async frame reader and writer
//! - [`peer`]: Bridges, clients, servers and their lifecycle hooks
//! - [`messages`]: Message types shared by the `skein` binary and demos

/// Re-export transport types.
pub mod transport {
    pub use skein_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use skein_codec::*;
}

/// Re-export frame types.
pub mod frame {
    pub use skein_frame::*;
}

/// Re-export peer types.
pub mod peer {
    pub use skein_peer::*;
}

pub mod messages;
