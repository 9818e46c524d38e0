//! Connections, clients and servers exchanging typed packets over TCP.
//!
//! A [`Bridge`] wraps one connected stream. A [`Client`] owns one bridge and
//! a [`Server`] owns one per accepted connection; both drive user hooks from
//! a dispatch task per bridge. Hooks are registered in a setup closure and
//! are frozen before the first connection becomes active.
//!
//! Packet hooks read their own frames and route them by object id:
//!
//! ```no_run
//! # async fn demo() -> skein_peer::Result<()> {
//! use skein_peer::Server;
//!
//! let server = Server::start(7000, |hooks| {
//!     hooks.on_packet_received(|server, bridge| async move {
//!         let frame = bridge.read_frame().await?;
//!         if frame.object_id == 1 {
//!             let text: skein_frame::Packet<String> = frame.packet()?;
//!             server.broadcast(&text.payload, 1).await?;
//!         }
//!         Ok(())
//!     });
//! })
//! .await?;
//! # server.close().await;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod registry;
pub mod server;

pub use bridge::Bridge;
pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::{PeerError, Result};
pub use hooks::{BoxFuture, ClientHooks, ServerHooks};
pub use registry::{BroadcastFailure, BroadcastReport, ConnectionRegistry};
pub use server::Server;
