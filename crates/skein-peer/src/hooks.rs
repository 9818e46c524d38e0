//! Lifecycle hook registries.
//!
//! Hooks are registered inside the setup closure passed to
//! [`Client::start`](crate::Client::start) or
//! [`Server::start`](crate::Server::start). Once the client or server is
//! running the registry is shared read-only, so hooks cannot be added while
//! traffic flows.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bridge::Bridge;
use crate::error::Result;
use crate::server::Server;

/// Boxed future returned by packet hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type Callback = Box<dyn Fn() + Send + Sync>;
type BridgeCallback = Box<dyn Fn(&Arc<Bridge>) + Send + Sync>;
pub(crate) type ClientPacketHook =
    Box<dyn Fn(Arc<Bridge>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
pub(crate) type ServerPacketHook =
    Box<dyn Fn(Server, Arc<Bridge>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Hooks for a [`Client`](crate::Client).
#[derive(Default)]
pub struct ClientHooks {
    on_connected: Vec<Callback>,
    on_disconnected: Vec<Callback>,
    on_close: Vec<Callback>,
    on_packet_received: Vec<ClientPacketHook>,
}

impl ClientHooks {
    /// Run once the connection is up, before the first packet hook.
    pub fn on_connected(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_connected.push(Box::new(hook));
        self
    }

    /// Run once when the dispatch loop ends.
    pub fn on_disconnected(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_disconnected.push(Box::new(hook));
        self
    }

    /// Run on every [`Client::close`](crate::Client::close).
    pub fn on_close(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_close.push(Box::new(hook));
        self
    }

    /// Run repeatedly while connected. The hook reads its own frame from the
    /// bridge and routes it by object id; an `Err` ends the connection.
    pub fn on_packet_received<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Arc<Bridge>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_packet_received
            .push(Box::new(move |bridge| Box::pin(hook(bridge))));
        self
    }

    pub(crate) fn fire_connected(&self) {
        self.on_connected.iter().for_each(|hook| hook());
    }

    pub(crate) fn fire_disconnected(&self) {
        self.on_disconnected.iter().for_each(|hook| hook());
    }

    pub(crate) fn fire_close(&self) {
        self.on_close.iter().for_each(|hook| hook());
    }

    pub(crate) fn packet_hooks(&self) -> &[ClientPacketHook] {
        &self.on_packet_received
    }
}

/// Hooks for a [`Server`].
#[derive(Default)]
pub struct ServerHooks {
    on_connected: Vec<BridgeCallback>,
    on_disconnected: Vec<BridgeCallback>,
    on_close: Vec<Callback>,
    on_packet_received: Vec<ServerPacketHook>,
}

impl ServerHooks {
    /// Run for each accepted connection, after it joins the registry.
    pub fn on_connected(
        &mut self,
        hook: impl Fn(&Arc<Bridge>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_connected.push(Box::new(hook));
        self
    }

    /// Run once per connection, after it leaves the registry.
    pub fn on_disconnected(
        &mut self,
        hook: impl Fn(&Arc<Bridge>) + Send + Sync + 'static,
    ) -> &mut Self {
        self.on_disconnected.push(Box::new(hook));
        self
    }

    /// Run on every [`Server::close`].
    pub fn on_close(&mut self, hook: impl Fn() + Send + Sync + 'static) -> &mut Self {
        self.on_close.push(Box::new(hook));
        self
    }

    /// Run repeatedly for each connection while it is open. The hook gets a
    /// handle to the server, for broadcasting, and the connection's bridge.
    pub fn on_packet_received<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Server, Arc<Bridge>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_packet_received
            .push(Box::new(move |server, bridge| Box::pin(hook(server, bridge))));
        self
    }

    pub(crate) fn fire_connected(&self, bridge: &Arc<Bridge>) {
        self.on_connected.iter().for_each(|hook| hook(bridge));
    }

    pub(crate) fn fire_disconnected(&self, bridge: &Arc<Bridge>) {
        self.on_disconnected.iter().for_each(|hook| hook(bridge));
    }

    pub(crate) fn fire_close(&self) {
        self.on_close.iter().for_each(|hook| hook());
    }

    pub(crate) fn packet_hooks(&self) -> &[ServerPacketHook] {
        &self.on_packet_received
    }
}

/// Log once at activation if more than one packet hook is registered.
///
/// Every hook performs its own read, so with several hooks each one sees a
/// different frame.
pub(crate) fn warn_on_multiple_packet_hooks(count: usize, side: &'static str) {
    if count > 1 {
        warn!(
            side,
            count, "multiple packet hooks registered; each consumes distinct frames"
        );
    }
}

/// Drive packet hooks against `bridge` until one fails or the bridge closes.
///
/// Each pass calls every hook once, in registration order. With no hooks the
/// loop just waits for the bridge to close.
pub(crate) async fn dispatch<H>(
    bridge: &Bridge,
    hooks: &[H],
    call: impl Fn(&H) -> BoxFuture<'static, Result<()>>,
) {
    if hooks.is_empty() {
        bridge.closed().await;
        return;
    }

    while bridge.is_connected() {
        for hook in hooks {
            if let Err(err) = call(hook).await {
                debug!(bridge = bridge.id(), error = %err, disconnect = err.is_disconnect(), "dispatch ended");
                return;
            }
        }
    }
}

/// Run a dispatch loop on its own task and wait for it.
///
/// A panicking packet hook ends the loop like a hook error does, so the
/// caller's teardown still runs.
pub(crate) async fn run_isolated(
    bridge_id: u64,
    dispatching: impl Future<Output = ()> + Send + 'static,
) {
    if let Err(err) = tokio::spawn(dispatching).await {
        warn!(bridge = bridge_id, error = %err, "dispatch task aborted");
    }
}
