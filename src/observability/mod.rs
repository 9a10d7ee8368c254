//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one span per reconcile cycle)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Cycle ID flows through every log line of a reconciliation
//! - Metric handles are injected, not looked up at call sites

pub mod logging;
pub mod metrics;

pub use self::metrics::ReconcileMetrics;
