//! Client connection accounting.
//!
//! Every accepted socket takes a [`ClientSlot`] for as long as its handler
//! runs. The slot carries the id and peer used in log fields and keeps the
//! open-connection count honest even if the handler panics.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Names a client connection in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counts {
    accepted: AtomicU64,
    open: AtomicUsize,
}

/// Shared view of the proxy's client connections.
#[derive(Debug, Clone, Default)]
pub struct ClientConnections {
    counts: Arc<Counts>,
}

impl ClientConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for a newly accepted client.
    pub fn open(&self, peer: SocketAddr) -> ClientSlot {
        let id = ClientId(self.counts.accepted.fetch_add(1, Ordering::Relaxed) + 1);
        self.counts.open.fetch_add(1, Ordering::SeqCst);
        ClientSlot {
            id,
            peer,
            counts: Arc::clone(&self.counts),
        }
    }

    /// Clients whose handler is still running.
    pub fn open_count(&self) -> usize {
        self.counts.open.load(Ordering::SeqCst)
    }

    /// Clients accepted since startup.
    pub fn accepted_count(&self) -> u64 {
        self.counts.accepted.load(Ordering::Relaxed)
    }
}

/// One open client connection; closing is recorded on drop.
#[derive(Debug)]
pub struct ClientSlot {
    id: ClientId,
    peer: SocketAddr,
    counts: Arc<Counts>,
}

impl ClientSlot {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.counts.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(client = %self.id, peer_addr = %self.peer, "Client slot released");
    }
}
