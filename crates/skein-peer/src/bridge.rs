use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use skein_frame::{Frame, FrameConfig, FrameReader, FrameWriter, Packet};
use skein_transport::{SocketHandle, Stream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{PeerError, Result};

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// A live connection wrapping one TCP stream.
///
/// Reads and writes may run concurrently from different tasks; each direction
/// is serialized by its own lock. The bridge moves one way from open to
/// closed. [`Bridge::close`] interrupts any pending read or write, which then
/// fails with [`PeerError::Closed`], and releases the socket.
pub struct Bridge {
    id: u64,
    peer_addr: SocketAddr,
    reader: Mutex<Option<FrameReader<OwnedReadHalf>>>,
    writer: Mutex<Option<FrameWriter<OwnedWriteHalf>>>,
    socket: SocketHandle,
    cancel: CancellationToken,
}

impl Bridge {
    /// Take ownership of a connected stream.
    pub fn from_stream(stream: Stream, config: FrameConfig) -> Result<Self> {
        let id = NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed);
        let peer_addr = stream.peer_addr();
        let socket = stream.socket_handle()?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            id,
            peer_addr,
            reader: Mutex::new(Some(FrameReader::with_config(read_half, config.clone()))),
            writer: Mutex::new(Some(FrameWriter::with_config(write_half, config))),
            socket,
            cancel: CancellationToken::new(),
        })
    }

    /// Process-unique id, assigned in creation order.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Write raw bytes and flush.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.guard(async { Ok(self.writer().await?.write_all(data).await?) })
            .await
    }

    /// Read exactly `n` raw bytes.
    pub async fn read(&self, n: usize) -> Result<Bytes> {
        self.guard(async { Ok(self.reader().await?.read_exact(n).await?) })
            .await
    }

    /// Read the next complete frame.
    pub async fn read_frame(&self) -> Result<Frame> {
        let frame = self
            .guard(async { Ok(self.reader().await?.read_frame().await?) })
            .await?;
        trace!(bridge = self.id, object_id = frame.object_id, "frame received");
        Ok(frame)
    }

    pub async fn write_frame(&self, frame: &Frame) -> Result<()> {
        self.guard(async { Ok(self.writer().await?.write_frame(frame).await?) })
            .await
    }

    /// Encode `packet` under `object_id` and send it as one frame.
    pub async fn write_packet<T: Serialize>(&self, packet: &Packet<T>, object_id: u32) -> Result<()> {
        let bytes = packet.encode(object_id)?;
        self.write_encoded(&bytes).await
    }

    /// Send a frame encoded ahead of time, header included.
    pub(crate) async fn write_encoded(&self, frame: &[u8]) -> Result<()> {
        self.guard(async { Ok(self.writer().await?.write_encoded(frame).await?) })
            .await
    }

    /// Read the next frame and decode it as `Packet<T>`, ignoring its object id.
    pub async fn read_packet<T: DeserializeOwned>(&self) -> Result<Packet<T>> {
        let frame = self.read_frame().await?;
        Ok(frame.packet()?)
    }

    /// False once the bridge has been closed.
    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// True if no received bytes are waiting to be read.
    ///
    /// A point-in-time heuristic: more data may already be in flight.
    pub fn all_frames_processed(&self) -> bool {
        if !self.is_connected() {
            return true;
        }
        match self.socket.available() {
            Ok(pending) => pending == 0,
            Err(err) => {
                debug!(bridge = self.id, error = %err, "could not query unread bytes");
                true
            }
        }
    }

    /// Close the bridge.
    ///
    /// Pending reads and writes are interrupted, the socket is shut down in
    /// both directions and both halves are dropped, so the peer sees
    /// end-of-stream and its later writes fail. Later calls do nothing.
    pub async fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        if let Err(err) = self.socket.shutdown() {
            debug!(bridge = self.id, error = %err, "socket shutdown failed");
        }
        drop(self.writer.lock().await.take());
        drop(self.reader.lock().await.take());
        debug!(bridge = self.id, peer = %self.peer_addr, "bridge closed");
    }

    /// Resolve once the bridge is closed.
    pub async fn closed(&self) {
        self.cancel.cancelled().await
    }

    async fn reader(&self) -> Result<MappedMutexGuard<'_, FrameReader<OwnedReadHalf>>> {
        MutexGuard::try_map(self.reader.lock().await, |half| half.as_mut())
            .map_err(|_| PeerError::Closed)
    }

    async fn writer(&self) -> Result<MappedMutexGuard<'_, FrameWriter<OwnedWriteHalf>>> {
        MutexGuard::try_map(self.writer.lock().await, |half| half.as_mut())
            .map_err(|_| PeerError::Closed)
    }

    async fn guard<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        if self.cancel.is_cancelled() {
            return Err(PeerError::Closed);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PeerError::Closed),
            result = op => result,
        }
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.id)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}
