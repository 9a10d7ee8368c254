//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define reconciliation metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `hostplane_reconcile_cycles_total` (counter): cycles started
//! - `hostplane_reconcile_failures_total` (counter): failed cycles by stage
//! - `hostplane_rollbacks_total` (counter): rollbacks by outcome
//! - `hostplane_build_warnings_total` (counter): hosts left out or degraded
//! - `hostplane_reconcile_duration_seconds` (histogram): cycle latency
//!
//! # Design Decisions
//! - Handles are resolved once and injected into the reconciler, so tests
//!   can pass `ReconcileMetrics::noop()` and never touch a global recorder

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Counter, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::reconciler::ReconcileError;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

fn describe_metrics() {
    describe_counter!("hostplane_reconcile_cycles_total", "Reconciliation cycles started");
    describe_counter!("hostplane_reconcile_failures_total", "Reconciliation cycles that failed, by stage");
    describe_counter!("hostplane_rollbacks_total", "Rollbacks to the previous document, by outcome");
    describe_counter!("hostplane_build_warnings_total", "Hosts excluded or degraded by the builder");
    describe_histogram!("hostplane_reconcile_duration_seconds", "Duration of reconciliation cycles");
}

/// Metric handles used by the reconciler.
#[derive(Clone)]
pub struct ReconcileMetrics {
    cycles: Counter,
    build_warnings: Counter,
    /// One handle per `ReconcileError::stage()` label.
    failures: Vec<(&'static str, Counter)>,
    rollbacks_restored: Counter,
    rollbacks_failed: Counter,
    duration: Histogram,
}

impl ReconcileMetrics {
    /// Handles registered with the installed global recorder.
    pub fn register() -> Self {
        Self {
            cycles: counter!("hostplane_reconcile_cycles_total"),
            build_warnings: counter!("hostplane_build_warnings_total"),
            failures: ReconcileError::STAGES
                .iter()
                .map(|stage| (*stage, counter!("hostplane_reconcile_failures_total", "stage" => *stage)))
                .collect(),
            rollbacks_restored: counter!("hostplane_rollbacks_total", "outcome" => "restored"),
            rollbacks_failed: counter!("hostplane_rollbacks_total", "outcome" => "failed"),
            duration: histogram!("hostplane_reconcile_duration_seconds"),
        }
    }

    /// Handles that record nothing.
    pub fn noop() -> Self {
        Self {
            cycles: Counter::noop(),
            build_warnings: Counter::noop(),
            failures: ReconcileError::STAGES.iter().map(|stage| (*stage, Counter::noop())).collect(),
            rollbacks_restored: Counter::noop(),
            rollbacks_failed: Counter::noop(),
            duration: Histogram::noop(),
        }
    }

    pub fn cycle_started(&self) {
        self.cycles.increment(1);
    }

    pub fn build_warnings(&self, count: usize) {
        self.build_warnings.increment(count as u64);
    }

    pub fn cycle_failed(&self, error: &ReconcileError) {
        let stage = error.stage();
        if let Some((_, counter)) = self.failures.iter().find(|(s, _)| *s == stage) {
            counter.increment(1);
        }
    }

    pub fn rollback(&self, restored: bool) {
        if restored {
            self.rollbacks_restored.increment(1);
        } else {
            self.rollbacks_failed.increment(1);
        }
    }

    pub fn cycle_finished(&self, elapsed: Duration) {
        self.duration.record(elapsed.as_secs_f64());
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::noop()
    }
}
