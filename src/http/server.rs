//! Proxy server: accept loop and handler dispatch.
//!
//! # Responsibilities
//! - Build the shared pool, ledger, and header name from configuration
//! - Accept client connections and spawn one handler task per connection
//! - Keep accepting through transient accept errors
//! - Stop on a fatal accept error or the stop signal

use std::sync::Arc;
use std::time::Duration;

use hyper::header::{HeaderName, InvalidHeaderName};

use crate::backend::BackendPool;
use crate::config::ProxyConfig;
use crate::http::handler::{self, ProxyContext};
use crate::lifecycle::ShutdownSignal;
use crate::net::{ClientConnections, Listener, ListenerError};
use crate::stats::StatsLedger;

/// Pause after a transient accept error so fd exhaustion does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// The forwarding proxy.
#[derive(Debug)]
pub struct ProxyServer {
    ctx: Arc<ProxyContext>,
    clients: ClientConnections,
}

impl ProxyServer {
    /// Create a server from a validated configuration.
    pub fn new(config: &ProxyConfig) -> Result<Self, InvalidHeaderName> {
        let stats_header = HeaderName::from_bytes(config.stats.header.as_bytes())?;
        let pool = Arc::new(BackendPool::new(&config.backend, &config.pool));

        tracing::info!(
            backend = %config.backend.address,
            pool_capacity = config.pool.capacity,
            acquire_timeout_ms = config.pool.acquire_timeout_ms,
            release_timeout_ms = config.pool.release_timeout_ms,
            "Backend pool configured"
        );

        Ok(Self {
            ctx: Arc::new(ProxyContext {
                pool,
                ledger: Arc::new(StatsLedger::new()),
                stats_header,
            }),
            clients: ClientConnections::new(),
        })
    }

    /// Shared stats ledger; stays readable while the server runs.
    pub fn ledger(&self) -> Arc<StatsLedger> {
        Arc::clone(&self.ctx.ledger)
    }

    /// Shared backend pool.
    pub fn pool(&self) -> Arc<BackendPool> {
        Arc::clone(&self.ctx.pool)
    }

    /// Live view of client connection counts.
    pub fn clients(&self) -> ClientConnections {
        self.clients.clone()
    }

    /// Accept connections until `stop` fires or the listener breaks.
    ///
    /// Handlers are spawned and never awaited; returning does not end them.
    pub async fn run(self, listener: Listener, mut stop: ShutdownSignal) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy accepting connections");
        }

        loop {
            tokio::select! {
                _ = stop.recv() => {
                    tracing::info!("Stopping accept loop");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let slot = self.clients.open(peer);
                            tracing::debug!(
                                client = %slot.id(),
                                peer_addr = %peer,
                                open_clients = self.clients.open_count(),
                                "Client connected"
                            );
                            tokio::spawn(handler::serve_connection(stream, Arc::clone(&self.ctx), slot));
                        }
                        Err(e) if e.is_fatal() => {
                            tracing::error!(error = %e, "Listener failed, no longer serving");
                            return Err(e);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        for (path, bytes) in self.ctx.ledger.snapshot() {
            tracing::info!(path = %path, bytes, "Bytes served");
        }
        tracing::info!(
            clients_accepted = self.clients.accepted_count(),
            open_clients = self.clients.open_count(),
            backend_dials = self.ctx.pool.dial_count(),
            idle_backend_connections = self.ctx.pool.idle_count(),
            "Proxy stopped"
        );
        Ok(())
    }
}
