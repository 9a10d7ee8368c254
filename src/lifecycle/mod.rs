//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Probe engine version → Restore applied record → Initial reconcile
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Broadcast → API drains, watcher stops → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - An incompatible engine is fatal; an unreachable admin endpoint is not
//! - A failed initial reconcile is logged and left for the next trigger
//! - In-flight cycles finish on their own task; shutdown never cuts an apply

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{preflight, StartupError};
