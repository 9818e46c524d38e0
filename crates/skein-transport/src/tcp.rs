use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::Stream;

/// TCP listening endpoint.
///
/// Provides bind/accept on a local address and a `connect` constructor for the
/// outbound side. Dropping the endpoint closes the listening socket.
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `addr`. Port `0` picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::Bind { addr, source: e })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::Bind { addr, source: e })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection.
    pub async fn accept(&self) -> Result<Stream> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Stream::from_tcp(stream)
    }

    /// Connect to a listening endpoint.
    pub async fn connect(host: &str, port: u16) -> Result<Stream> {
        let stream =
            TcpStream::connect((host, port))
                .await
                .map_err(|e| TransportError::Connect {
                    addr: format!("{host}:{port}"),
                    source: e,
                })?;
        debug!(host, port, "connected over tcp");
        Stream::from_tcp(stream)
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
