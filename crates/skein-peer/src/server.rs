use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use skein_frame::Packet;
use skein_transport::{Stream, TcpEndpoint, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::config::ServerConfig;
use crate::error::{PeerError, Result};
use crate::hooks::{dispatch, run_isolated, warn_on_multiple_packet_hooks, ServerHooks};
use crate::registry::{BroadcastReport, ConnectionRegistry};

/// A TCP server running one dispatch task per accepted connection.
///
/// `Server` is a cheap handle; clones share the same listener, registry and
/// hooks. Packet hooks receive a clone so they can broadcast.
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

struct Inner {
    local_addr: SocketAddr,
    listener: Mutex<Option<TcpEndpoint>>,
    registry: ConnectionRegistry,
    hooks: ServerHooks,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl Server {
    /// Bind `port` and start accepting in the background.
    pub async fn start(port: u16, setup: impl FnOnce(&mut ServerHooks)) -> Result<Self> {
        Self::start_with_config(port, ServerConfig::default(), setup).await
    }

    pub async fn start_with_config(
        port: u16,
        config: ServerConfig,
        setup: impl FnOnce(&mut ServerHooks),
    ) -> Result<Self> {
        let server = Self::prepare_with_config(port, config, setup).await?;
        let listener = server.take_listener()?;
        tokio::spawn(server.clone().accept_loop(listener));
        Ok(server)
    }

    /// Bind `port` without accepting yet. Call [`Server::startup`] to run the
    /// accept loop on the current task.
    pub async fn prepare(port: u16, setup: impl FnOnce(&mut ServerHooks)) -> Result<Self> {
        Self::prepare_with_config(port, ServerConfig::default(), setup).await
    }

    pub async fn prepare_with_config(
        port: u16,
        config: ServerConfig,
        setup: impl FnOnce(&mut ServerHooks),
    ) -> Result<Self> {
        let mut hooks = ServerHooks::default();
        setup(&mut hooks);

        let listener = TcpEndpoint::bind(SocketAddr::new(config.bind_addr, port)).await?;
        let local_addr = listener.local_addr();

        Ok(Self {
            inner: Arc::new(Inner {
                local_addr,
                listener: Mutex::new(Some(listener)),
                registry: ConnectionRegistry::new(),
                hooks,
                config,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Run the accept loop until [`Server::close`] or an unrecoverable accept
    /// error. The listening socket is closed when this returns.
    ///
    /// Fails with [`PeerError::AlreadyStarted`] if the loop already ran, or
    /// the server was closed before it started.
    pub async fn startup(&self) -> Result<()> {
        let listener = self.take_listener()?;
        self.clone().accept_loop(listener).await
    }

    /// Address actually bound, useful with port `0`.
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Snapshot of live connections, in accept order.
    pub fn connections(&self) -> Vec<Arc<Bridge>> {
        self.inner.registry.snapshot()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Send `value` to every live connection.
    ///
    /// The frame is encoded once, so an encode error fails the call before
    /// anything is written. Write failures are collected in the report.
    pub async fn broadcast<T>(&self, value: &T, object_id: u32) -> Result<BroadcastReport>
    where
        T: ?Sized + Serialize,
    {
        let frame = Packet::new(value).encode(object_id)?;
        Ok(self.inner.registry.broadcast(&frame).await)
    }

    /// True if no connection has received bytes waiting to be read.
    pub fn all_frames_processed(&self) -> bool {
        self.inner
            .registry
            .snapshot()
            .iter()
            .all(|bridge| bridge.all_frames_processed())
    }

    /// Fire `on_close` hooks and stop accepting.
    ///
    /// Live connections are left open; each ends when its peer hangs up.
    pub async fn close(&self) {
        self.inner.hooks.fire_close();
        self.inner.shutdown.cancel();
        drop(self.take_listener().ok());
        info!(addr = %self.inner.local_addr, "server closed");
    }

    fn take_listener(&self) -> Result<TcpEndpoint> {
        self.inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PeerError::AlreadyStarted)
    }

    async fn accept_loop(self, listener: TcpEndpoint) -> Result<()> {
        warn_on_multiple_packet_hooks(self.inner.hooks.packet_hooks().len(), "server");
        debug!(addr = %self.inner.local_addr, "accept loop started");

        let result = loop {
            let accepted = tokio::select! {
                biased;
                _ = self.inner.shutdown.cancelled() => break Ok(()),
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok(stream) => self.admit(stream),
                Err(TransportError::Accept(err)) if is_transient(err.kind()) => {
                    debug!(error = %err, "transient accept failure");
                }
                Err(err) => {
                    warn!(error = %err, "accept loop failed");
                    break Err(err.into());
                }
            }
        };

        drop(listener);
        debug!(addr = %self.inner.local_addr, "accept loop stopped");
        result
    }

    fn admit(&self, stream: Stream) {
        if self.inner.config.nodelay {
            if let Err(err) = stream.set_nodelay(true) {
                debug!(error = %err, "could not set nodelay");
            }
        }

        let bridge = match Bridge::from_stream(stream, self.inner.config.frame.clone()) {
            Ok(bridge) => Arc::new(bridge),
            Err(err) => {
                debug!(error = %err, "dropping connection that could not be wrapped");
                return;
            }
        };
        self.inner.registry.add(Arc::clone(&bridge));
        info!(bridge = %bridge, peer = %bridge.peer_addr(), "client connected");

        self.inner.hooks.fire_connected(&bridge);
        tokio::spawn(self.clone().serve_connection(bridge));
    }

    async fn serve_connection(self, bridge: Arc<Bridge>) {
        let dispatching = {
            let server = self.clone();
            let bridge = Arc::clone(&bridge);
            async move {
                dispatch(&bridge, server.inner.hooks.packet_hooks(), |hook| {
                    hook(server.clone(), Arc::clone(&bridge))
                })
                .await
            }
        };
        run_isolated(bridge.id(), dispatching).await;

        self.inner.registry.remove(bridge.id());
        self.inner.hooks.fire_disconnected(&bridge);
        bridge.close().await;
        info!(bridge = %bridge, "client disconnected");
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.inner.local_addr)
            .field("connections", &self.inner.registry.len())
            .finish()
    }
}

fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}
