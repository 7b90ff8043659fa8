//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, error classification)
//!     → connection.rs (client id + open-connection slot)
//!     → Hand off to the HTTP connection handler
//! ```
//!
//! # Design Decisions
//! - The accept loop never waits on a handler
//! - Accept errors are scoped: only a broken listening socket stops serving

pub mod connection;
pub mod listener;

pub use connection::{ClientConnections, ClientId, ClientSlot};
pub use listener::{Listener, ListenerError};
