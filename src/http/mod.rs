//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, spawn per connection)
//!     → handler.rs (HTTP/1 request loop)
//!         → backend pool acquire → forward → read response
//!         → stats ledger → X-Bytes header
//!         → response to client, backend released in the background
//! ```

pub mod handler;
pub mod server;

pub use handler::{ProxyContext, ProxyError};
pub use server::ProxyServer;
