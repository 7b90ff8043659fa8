//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → optional Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Connection IDs are attached as log fields so one client's cycles can be
//!   followed across handler, pool, and backend events
//! - Metrics are off by default; the facade makes recording free until a
//!   recorder is installed

pub mod logging;
pub mod metrics;
