//! Bookkeeping of accepted TCP connections
//!
//! Each accepted socket is served by its own task. The tracker holds an abort
//! handle per task so `stop` can terminate connections that did not close
//! on their own (idle keep-alives, slow clients). Entries are removed by the
//! connection task itself when it finishes.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::AbortHandle;

pub type ConnectionId = u64;

struct TrackedConnection {
    peer: SocketAddr,
    abort: AbortHandle,
}

/// Live connection registry
#[derive(Default)]
pub struct ConnectionTracker {
    connections: Mutex<HashMap<ConnectionId, TrackedConnection>>,
    next_id: AtomicU64,
    idle: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `serve` as a tracked connection task.
    ///
    /// The entry is inserted while the registry lock is held, so the task's
    /// own removal on completion always happens after the insert.
    pub fn spawn<F>(self: &Arc<Self>, peer: SocketAddr, serve: F) -> ConnectionId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tracker = Arc::clone(self);

        let mut connections = self.connections.lock();
        let handle = tokio::spawn(async move {
            serve.await;
            tracker.remove(id);
        });
        connections.insert(
            id,
            TrackedConnection {
                peer,
                abort: handle.abort_handle(),
            },
        );
        id
    }

    fn remove(&self, id: ConnectionId) {
        let mut connections = self.connections.lock();
        if connections.remove(&id).is_some() {
            tracing::trace!("Connection {} closed", id);
        }
        if connections.is_empty() {
            self.idle.notify_waiters();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    pub fn peers(&self) -> Vec<SocketAddr> {
        self.connections.lock().values().map(|c| c.peer).collect()
    }

    /// Wait until no connections remain. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                // Register before checking so a concurrent removal is not missed
                notified.as_mut().enable();
                if self.is_empty() {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    /// Abort every remaining connection task and clear the registry.
    ///
    /// Returns the number of connections that were terminated.
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<(ConnectionId, TrackedConnection)> =
            self.connections.lock().drain().collect();
        for (id, conn) in &drained {
            tracing::debug!("Destroying connection {} from {}", id, conn.peer);
            conn.abort.abort();
        }
        self.idle.notify_waiters();
        drained.len()
    }
}

impl std::fmt::Debug for ConnectionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionTracker")
            .field("connections", &self.len())
            .finish()
    }
}
