//! Backend connection subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler
//!     → pool.rs acquire (idle connection, or dial after acquire_timeout)
//!     → connection.rs (send request, read response head)
//!     → body.rs (stream the response body to the client)
//!     → pool.rs release on a detached task once the body ends
//!       (pool, or close after release_timeout)
//! ```
//!
//! A connection is owned by exactly one party at a time: the pool's idle
//! queue, the handler that acquired it, or the response body streaming
//! from it.

pub mod body;
pub mod connection;
pub mod pool;

use std::time::Duration;

use thiserror::Error;

pub use body::PooledBody;
pub use connection::{BackendConnection, BackendConnectionId, ProxyBody};
pub use pool::{BackendPool, Release};

/// Errors talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to backend {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to backend {address} after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("backend handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("backend exchange failed: {0}")]
    Send(#[source] hyper::Error),
}
