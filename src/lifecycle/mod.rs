//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Apply overrides → Validate → Init logging/metrics → Bind → Serve
//!
//! Stop (shutdown.rs, signals.rs):
//!     SIGINT → Shutdown::trigger → accept loop exits → stats summary logged
//! ```
//!
//! # Design Decisions
//! - Fail fast: a startup error (bad config, bind failure) is fatal
//! - No drain: in-flight handlers end with the process

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::stop_on_ctrl_c;
