use skein_codec::CodecError;
use skein_frame::FrameError;
use skein_transport::TransportError;

/// Errors that can occur in bridge, client and server operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The bridge was closed locally.
    #[error("bridge closed")]
    Closed,

    /// `startup` was called on a server whose accept loop already ran.
    #[error("server already started")]
    AlreadyStarted,
}

impl PeerError {
    /// True when the error means the connection is gone rather than that a
    /// value was malformed.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            PeerError::Closed
                | PeerError::Transport(TransportError::Io(_))
                | PeerError::Frame(FrameError::ConnectionClosed | FrameError::Io(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn hangups_count_as_disconnects() {
        let reset = PeerError::Transport(TransportError::Io(io::Error::from(
            io::ErrorKind::ConnectionReset,
        )));
        assert!(reset.is_disconnect());
        assert!(PeerError::Closed.is_disconnect());
        assert!(PeerError::Frame(FrameError::ConnectionClosed).is_disconnect());
    }

    #[test]
    fn setup_and_decode_failures_are_not_disconnects() {
        let refused = PeerError::Transport(TransportError::Connect {
            addr: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert!(!refused.is_disconnect());
        assert!(!PeerError::AlreadyStarted.is_disconnect());
        assert!(!PeerError::Codec(CodecError::InvalidChar(0xD800)).is_disconnect());
    }
}
