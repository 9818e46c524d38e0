use std::net::{IpAddr, Ipv4Addr};

use skein_frame::FrameConfig;

/// Server behavior configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to listen on. Default: all IPv4 interfaces.
    pub bind_addr: IpAddr,
    /// Disable Nagle's algorithm on accepted connections. Default: `true`.
    pub nodelay: bool,
    pub frame: FrameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            nodelay: true,
            frame: FrameConfig::default(),
        }
    }
}

/// Client behavior configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Disable Nagle's algorithm on the connection. Default: `true`.
    pub nodelay: bool,
    pub frame: FrameConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            frame: FrameConfig::default(),
        }
    }
}
