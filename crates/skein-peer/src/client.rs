use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use skein_frame::Packet;
use skein_transport::TcpEndpoint;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bridge::Bridge;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::hooks::{dispatch, run_isolated, warn_on_multiple_packet_hooks, ClientHooks};

/// Connect to a server and run its hooks on a background task.
///
/// ```no_run
/// # async fn demo() -> skein_peer::Result<()> {
/// use skein_peer::Client;
///
/// let client = Client::start("127.0.0.1", 7000, |hooks| {
///     hooks.on_packet_received(|bridge| async move {
///         let frame = bridge.read_frame().await?;
///         println!("object {}", frame.object_id);
///         Ok(())
///     });
/// })
/// .await?;
///
/// client.send("hello", 1).await?;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    bridge: Arc<Bridge>,
    hooks: Arc<ClientHooks>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect with default configuration.
    pub async fn start(
        host: &str,
        port: u16,
        setup: impl FnOnce(&mut ClientHooks),
    ) -> Result<Self> {
        Self::start_with_config(host, port, ClientConfig::default(), setup).await
    }

    /// Register hooks through `setup`, connect, then start dispatching.
    ///
    /// Hooks are frozen once `setup` returns.
    pub async fn start_with_config(
        host: &str,
        port: u16,
        config: ClientConfig,
        setup: impl FnOnce(&mut ClientHooks),
    ) -> Result<Self> {
        let mut hooks = ClientHooks::default();
        setup(&mut hooks);
        let hooks = Arc::new(hooks);

        let stream = TcpEndpoint::connect(host, port).await?;
        if config.nodelay {
            stream.set_nodelay(true)?;
        }
        let bridge = Arc::new(Bridge::from_stream(stream, config.frame)?);
        info!(bridge = %bridge, host, port, "client connected");

        warn_on_multiple_packet_hooks(hooks.packet_hooks().len(), "client");
        let task = tokio::spawn(run(Arc::clone(&bridge), Arc::clone(&hooks)));

        Ok(Self {
            bridge,
            hooks,
            dispatch: Mutex::new(Some(task)),
        })
    }

    /// The connection to the server.
    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Wrap `value` in a [`Packet`] stamped now and send it as one frame.
    pub async fn send<T>(&self, value: &T, object_id: u32) -> Result<()>
    where
        T: ?Sized + Serialize + Sync,
    {
        self.bridge.write_packet(&Packet::new(value), object_id).await
    }

    pub fn is_connected(&self) -> bool {
        self.bridge.is_connected()
    }

    /// True if no received bytes are waiting to be read.
    pub fn all_frames_processed(&self) -> bool {
        self.bridge.all_frames_processed()
    }

    /// Fire `on_close` hooks and close the connection.
    ///
    /// Closing interrupts the dispatch task's pending read, so `on_disconnected`
    /// hooks still run afterwards. Each call fires `on_close` again.
    pub async fn close(&self) {
        self.hooks.fire_close();
        self.bridge.close().await;
    }

    /// Wait for the dispatch task to finish.
    ///
    /// Returns immediately if another caller already joined.
    pub async fn join(&self) {
        let task = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(bridge = %self.bridge, error = %err, "client dispatch task failed");
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("bridge", &self.bridge).finish()
    }
}

async fn run(bridge: Arc<Bridge>, hooks: Arc<ClientHooks>) {
    hooks.fire_connected();
    debug!(bridge = %bridge, "client dispatch started");

    let dispatching = {
        let bridge = Arc::clone(&bridge);
        let hooks = Arc::clone(&hooks);
        async move {
            dispatch(&bridge, hooks.packet_hooks(), |hook| hook(Arc::clone(&bridge))).await
        }
    };
    run_isolated(bridge.id(), dispatching).await;

    hooks.fire_disconnected();
    bridge.close().await;
    debug!(bridge = %bridge, "client dispatch stopped");
}
