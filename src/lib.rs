//! Byte-tallying HTTP forwarding proxy.
//!
//! Relays every request to one fixed backend over pooled HTTP/1.1
//! connections and stamps each response with the cumulative number of bytes
//! served for its path (`X-Bytes`).

// Core subsystems
pub mod backend;
pub mod config;
pub mod http;
pub mod net;
pub mod stats;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
pub use stats::StatsLedger;
