//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the engine admin endpoint:
//!     → retries.rs (bounded attempts)
//!     → backoff.rs (doubling window, delay drawn from its upper half)
//! ```
//!
//! # Design Decisions
//! - Timeouts live on the client; every external call has a deadline
//! - Every retry loop has a fixed bound, so a down engine cannot hold the
//!   reconciler's writer slot indefinitely
//! - Jittered backoff prevents synchronized retries

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{Attempted, RetryPolicy};
