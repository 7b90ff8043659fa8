//! Backend connection pool.
//!
//! # Responsibilities
//! - Hand out idle backend connections, dialing when none arrives in time
//! - Take connections back, closing them when no slot frees in time
//! - Keep the idle set bounded by the configured capacity
//!
//! # Design Decisions
//! - The idle set is a bounded mpsc channel; the receiver sits behind a mutex
//!   so any number of handlers can wait on it
//! - Both directions are timed: a handler never waits on the pool longer than
//!   `acquire_timeout`, and a release task never outlives `release_timeout`
//! - No active health checks. Connections already seen closed are dropped on
//!   release and skipped on acquire; anything else surfaces as an error for
//!   the next user

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tokio::sync::Mutex;
use tokio::time;

use crate::backend::{BackendConnection, BackendError};
use crate::config::{BackendConfig, PoolConfig};
use crate::observability::metrics;

/// What happened to a released connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Queued for reuse.
    Pooled,
    /// Closed: pool full, pooling disabled, or connection already dead.
    Discarded,
}

struct IdleQueue {
    tx: mpsc::Sender<BackendConnection>,
    rx: Mutex<mpsc::Receiver<BackendConnection>>,
}

/// Bounded reservoir of reusable connections to the one backend.
pub struct BackendPool {
    address: String,
    connect_timeout: Duration,
    acquire_timeout: Duration,
    release_timeout: Duration,
    /// `None` when capacity is zero.
    idle: Option<IdleQueue>,
    dials: AtomicU64,
}

impl BackendPool {
    pub fn new(backend: &BackendConfig, pool: &PoolConfig) -> Self {
        let idle = (pool.capacity > 0).then(|| {
            let (tx, rx) = mpsc::channel(pool.capacity);
            IdleQueue { tx, rx: Mutex::new(rx) }
        });

        Self {
            address: backend.address.clone(),
            connect_timeout: backend.connect_timeout(),
            acquire_timeout: pool.acquire_timeout(),
            release_timeout: pool.release_timeout(),
            idle,
            dials: AtomicU64::new(0),
        }
    }

    /// Take an idle connection, or dial a fresh one if none shows up within
    /// the acquire timeout.
    pub async fn acquire(&self) -> Result<BackendConnection, BackendError> {
        if let Some(idle) = &self.idle {
            let waited = time::timeout(self.acquire_timeout, async {
                let mut rx = idle.rx.lock().await;
                loop {
                    match rx.recv().await {
                        Some(conn) if conn.is_closed() => {
                            tracing::debug!(backend_connection = %conn.id(), "Skipping closed idle backend connection");
                            metrics::record_pool_discard();
                        }
                        other => return other,
                    }
                }
            })
            .await;

            if let Ok(Some(conn)) = waited {
                metrics::record_pool_reuse();
                tracing::trace!(backend_connection = %conn.id(), "Reusing pooled backend connection");
                return Ok(conn);
            }

            tracing::trace!(
                timeout = ?self.acquire_timeout,
                "No idle backend connection in time, dialing"
            );
        }

        self.dial().await
    }

    async fn dial(&self) -> Result<BackendConnection, BackendError> {
        let conn = BackendConnection::connect(&self.address, self.connect_timeout).await?;
        self.dials.fetch_add(1, Ordering::Relaxed);
        metrics::record_backend_dial();
        Ok(conn)
    }

    /// Return a connection for reuse, closing it if no slot frees within the
    /// release timeout.
    pub async fn release(&self, conn: BackendConnection) -> Release {
        let Some(idle) = &self.idle else {
            drop(conn);
            return Release::Discarded;
        };

        if conn.is_closed() {
            tracing::debug!(backend_connection = %conn.id(), "Dropping closed backend connection");
            metrics::record_pool_discard();
            return Release::Discarded;
        }

        match idle.tx.send_timeout(conn, self.release_timeout).await {
            Ok(()) => Release::Pooled,
            Err(SendTimeoutError::Timeout(conn)) | Err(SendTimeoutError::Closed(conn)) => {
                tracing::debug!(backend_connection = %conn.id(), "Pool full, closing backend connection");
                metrics::record_pool_discard();
                Release::Discarded
            }
        }
    }

    /// Release on a background task; the caller never learns the outcome.
    ///
    /// Outside a runtime (process teardown) the connection is just closed.
    pub fn release_detached(self: &Arc<Self>, conn: BackendConnection) {
        let Ok(runtime) = Handle::try_current() else {
            return;
        };
        let pool = Arc::clone(self);
        runtime.spawn(async move {
            pool.release(conn).await;
        });
    }

    /// Connections currently waiting in the pool.
    pub fn idle_count(&self) -> usize {
        match &self.idle {
            Some(idle) => idle.tx.max_capacity() - idle.tx.capacity(),
            None => 0,
        }
    }

    /// Fresh connections dialed since startup.
    pub fn dial_count(&self) -> u64 {
        self.dials.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for BackendPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPool")
            .field("address", &self.address)
            .field("idle", &self.idle_count())
            .field("dials", &self.dial_count())
            .finish()
    }
}
