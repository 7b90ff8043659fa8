//! Per-path response byte accounting.
//!
//! # Data Flow
//! ```text
//! backend response (Content-Length)
//!     → ledger.rs (add to the path's running total)
//!     → new total written into the X-Bytes response header
//! ```
//!
//! # Design Decisions
//! - Totals live for the process lifetime; nothing is persisted
//! - Each path is an independent counter: no global lock across paths
//! - Unknown lengths (chunked, streaming) count as zero

pub mod ledger;

pub use ledger::StatsLedger;
