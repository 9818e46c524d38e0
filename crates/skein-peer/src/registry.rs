use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::bridge::Bridge;
use crate::error::PeerError;

/// Live connections of a server, in the order they were accepted.
///
/// The accept task adds and each connection task removes its own entry, so
/// access is serialized by a lock. The lock is never held across an await:
/// [`ConnectionRegistry::broadcast`] writes to a snapshot.
#[derive(Default)]
pub struct ConnectionRegistry {
    bridges: Mutex<Vec<Arc<Bridge>>>,
}

/// Outcome of a fan-out write.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Number of bridges the frame was written to.
    pub delivered: usize,
    pub failures: Vec<BroadcastFailure>,
}

impl BroadcastReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A bridge that could not be written to during a broadcast.
#[derive(Debug)]
pub struct BroadcastFailure {
    pub bridge_id: u64,
    pub error: PeerError,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bridge: Arc<Bridge>) {
        self.lock().push(bridge);
    }

    /// Remove the bridge with `id`. Returns it if it was registered.
    pub fn remove(&self, id: u64) -> Option<Arc<Bridge>> {
        let mut bridges = self.lock();
        let index = bridges.iter().position(|bridge| bridge.id() == id)?;
        Some(bridges.remove(index))
    }

    /// Copy of the current entries, in registry order.
    pub fn snapshot(&self) -> Vec<Arc<Bridge>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write one encoded frame to every registered bridge, in order.
    ///
    /// A failed write is recorded and the remaining bridges still get the
    /// frame.
    pub async fn broadcast(&self, frame: &Bytes) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for bridge in self.snapshot() {
            match bridge.write_encoded(frame).await {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(bridge = bridge.id(), error = %error, "broadcast write failed");
                    report.failures.push(BroadcastFailure {
                        bridge_id: bridge.id(),
                        error,
                    });
                }
            }
        }

        trace!(
            delivered = report.delivered,
            failed = report.failures.len(),
            "broadcast finished"
        );
        report
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Bridge>>> {
        self.bridges.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
