//! The reconciliation cycle.
//!
//! # Responsibilities
//! - Admit triggers through the [`Coalescer`]
//! - Drive snapshot → build → validate → apply → verify on a spawned task
//! - Retry apply once, then roll back to the last applied record
//! - Share each cycle's result with every caller coalesced into it

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use crate::builder::{BuildWarning, Builder, Document};
use crate::config::ReconcileConfig;
use crate::engine::{AdminError, EngineAdmin, Validator};
use crate::observability::ReconcileMetrics;
use crate::reconciler::coalesce::{Admission, Coalescer, Completion, RunState};
use crate::reconciler::error::{short, CycleContext, ReconcileError, RollbackOutcome};
use crate::reconciler::record::{AppliedRecord, RecordError, RecordFile};
use crate::reconciler::verify;
use crate::resilience::RetryPolicy;
use crate::store::DesiredStateSource;

/// Apply is attempted once and retried once.
const APPLY_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Building,
    Validating,
    Applying,
    Verifying,
    /// The last cycle failed to apply and the previous record was restored (or
    /// there was none). Left on the next trigger.
    RolledBack,
}

/// Result of the post-apply read-back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Matched,
    Mismatch { differences: Vec<String> },
    /// A follow-up cycle was already pending.
    Skipped,
    Unavailable { error: String },
    Disabled,
}

/// Summary of a successful cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub cycle_id: Uuid,
    pub generation: u64,
    pub revision: u64,
    pub fingerprint: String,
    pub routes: usize,
    pub warnings: Vec<BuildWarning>,
    pub verify: VerifyOutcome,
    pub applied_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Summary of the applied record for status output.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedSummary {
    pub fingerprint: String,
    pub applied_at: DateTime<Utc>,
    pub cycle_id: Uuid,
    pub revision: u64,
    pub routes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcilerStatus {
    pub phase: Phase,
    pub run_state: RunState,
    pub cycles: u64,
    pub applied: Option<AppliedSummary>,
    pub last_error: Option<String>,
}

#[derive(Clone)]
struct Finished {
    generation: u64,
    result: Result<ReconcileReport, ReconcileError>,
}

struct Inner {
    store: Arc<dyn DesiredStateSource>,
    builder: Builder,
    validator: Validator,
    admin: Arc<dyn EngineAdmin>,
    metrics: ReconcileMetrics,
    apply_policy: RetryPolicy,
    rollback_policy: RetryPolicy,
    verify: bool,
    record_file: Option<RecordFile>,
    record: ArcSwapOption<AppliedRecord>,
    coalescer: Coalescer,
    phase: watch::Sender<Phase>,
    finished: watch::Sender<Option<Finished>>,
    cycles: AtomicU64,
    last_error: ArcSwapOption<String>,
}

/// Converges the engine onto the desired state. Cheap to clone.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(
        config: &ReconcileConfig,
        store: Arc<dyn DesiredStateSource>,
        builder: Builder,
        validator: Validator,
        admin: Arc<dyn EngineAdmin>,
        metrics: ReconcileMetrics,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        let (finished, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                store,
                builder,
                validator,
                admin,
                metrics,
                apply_policy: RetryPolicy::new(
                    APPLY_ATTEMPTS,
                    config.apply_retry_base_ms,
                    config.apply_retry_max_ms,
                ),
                rollback_policy: RetryPolicy::new(
                    config.rollback_attempts,
                    config.apply_retry_base_ms,
                    config.apply_retry_max_ms,
                ),
                verify: config.verify,
                record_file: config.record_path.as_ref().map(RecordFile::new),
                record: ArcSwapOption::empty(),
                coalescer: Coalescer::new(),
                phase,
                finished,
                cycles: AtomicU64::new(0),
                last_error: ArcSwapOption::empty(),
            }),
        }
    }

    /// Request a cycle and wait for the one that covers this request.
    ///
    /// If a cycle is already running, the request is folded into a single
    /// follow-up cycle shared with every other request that arrived meanwhile.
    pub async fn trigger(&self, reason: &str) -> Result<ReconcileReport, ReconcileError> {
        let mut finished = self.inner.finished.subscribe();

        let target = match self.inner.coalescer.admit() {
            Admission::Start { generation } => {
                tracing::debug!(reason, generation, "Reconciliation triggered");
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.drive(generation).await });
                generation
            }
            Admission::Coalesced { generation } => {
                tracing::debug!(reason, generation, "Reconciliation coalesced into follow-up cycle");
                generation
            }
        };

        let done = finished
            .wait_for(|f| f.as_ref().is_some_and(|f| f.generation >= target))
            .await;
        match done {
            Ok(done) => match done.as_ref() {
                Some(f) => f.result.clone(),
                None => Err(ReconcileError::Interrupted),
            },
            Err(_) => Err(ReconcileError::Interrupted),
        }
    }

    /// Load the persisted record so a failed first apply can still roll back.
    ///
    /// Does not touch the engine.
    pub async fn restore_record(&self) -> Result<Option<String>, RecordError> {
        let Some(file) = &self.inner.record_file else {
            return Ok(None);
        };
        match file.load().await? {
            Some(record) => {
                let fingerprint = record.fingerprint.clone();
                tracing::info!(
                    path = ?file.path(),
                    fingerprint = %short(&fingerprint),
                    applied_at = %record.applied_at,
                    "Restored applied configuration record"
                );
                self.inner.record.store(Some(Arc::new(record)));
                Ok(Some(fingerprint))
            }
            None => Ok(None),
        }
    }

    /// The last document the engine accepted.
    pub fn applied(&self) -> Option<Arc<AppliedRecord>> {
        self.inner.record.load_full()
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.inner.phase.subscribe()
    }

    pub fn status(&self) -> ReconcilerStatus {
        ReconcilerStatus {
            phase: self.phase(),
            run_state: self.inner.coalescer.state(),
            cycles: self.inner.cycles.load(Ordering::Relaxed),
            applied: self.applied().map(|r| AppliedSummary {
                fingerprint: r.fingerprint.clone(),
                applied_at: r.applied_at,
                cycle_id: r.cycle_id,
                revision: r.revision,
                routes: r.document.route_count(),
            }),
            last_error: self.inner.last_error.load_full().map(|e| (*e).clone()),
        }
    }
}

impl Inner {
    fn set_phase(&self, phase: Phase) {
        self.phase.send_replace(phase);
    }

    /// Runs cycles until no follow-up is pending.
    async fn drive(self: Arc<Self>, mut generation: u64) {
        loop {
            let cycle_id = Uuid::new_v4();
            let span = tracing::info_span!("reconcile", cycle = %cycle_id, generation);
            let result = self.run_cycle(cycle_id, generation).instrument(span).await;

            match &result {
                Ok(_) => self.last_error.store(None),
                Err(e) => {
                    self.metrics.cycle_failed(e);
                    self.last_error.store(Some(Arc::new(e.to_string())));
                }
            }
            self.finished.send_replace(Some(Finished { generation, result }));

            match self.coalescer.complete() {
                Completion::RunAgain { generation: next } => generation = next,
                Completion::Done => break,
            }
        }
    }

    async fn run_cycle(&self, cycle_id: Uuid, generation: u64) -> Result<ReconcileReport, ReconcileError> {
        let started = Instant::now();
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.metrics.cycle_started();
        self.set_phase(Phase::Building);

        let snapshot = match self.store.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Failed to snapshot desired state");
                self.set_phase(Phase::Idle);
                return Err(e.into());
            }
        };

        let output = self.builder.build(&snapshot);
        for warning in &output.warnings {
            tracing::warn!(host = warning.host_id, excluded = warning.excluded, "{}", warning);
        }
        self.metrics.build_warnings(output.warnings.len());

        let mut context = CycleContext {
            cycle_id,
            generation,
            revision: snapshot.revision,
            fingerprint: output.document.fingerprint(),
            at: Utc::now(),
            domains: snapshot.enabled_domains(),
        };

        self.set_phase(Phase::Validating);
        let document = match self.validator.validate(&output.document.to_text()).await {
            Ok(document) => document,
            Err(source) => {
                tracing::error!(
                    error = %source,
                    diagnostic = source.diagnostic().unwrap_or(""),
                    "Engine rejected built configuration; active configuration untouched"
                );
                self.set_phase(Phase::Idle);
                return Err(ReconcileError::Validation { context, source });
            }
        };
        context.fingerprint = document.fingerprint();

        self.set_phase(Phase::Applying);
        let applied = self
            .apply_policy
            .run("apply", || self.admin.apply(&document))
            .await;
        if let Err(source) = applied.result {
            tracing::error!(
                error = %source,
                kind = source.kind(),
                attempts = applied.attempts,
                "Apply failed"
            );
            let err = self.roll_back(context, source).await;
            self.set_phase(Phase::RolledBack);
            return Err(err);
        }

        let verify = self.verify_applied(&document).await;
        let routes = document.route_count();
        let record = AppliedRecord::new(document, cycle_id, snapshot.revision);
        self.persist(&record).await;
        let applied_at = record.applied_at;
        let fingerprint = record.fingerprint.clone();
        self.record.store(Some(Arc::new(record)));
        self.set_phase(Phase::Idle);

        let elapsed = started.elapsed();
        self.metrics.cycle_finished(elapsed);
        tracing::info!(
            fingerprint = %short(&fingerprint),
            revision = snapshot.revision,
            routes,
            warnings = output.warnings.len(),
            elapsed = ?elapsed,
            "Configuration applied"
        );

        Ok(ReconcileReport {
            cycle_id,
            generation,
            revision: snapshot.revision,
            fingerprint,
            routes,
            warnings: output.warnings,
            verify,
            applied_at,
            duration_ms: elapsed.as_millis() as u64,
        })
    }

    async fn roll_back(&self, context: CycleContext, source: AdminError) -> ReconcileError {
        let Some(previous) = self.record.load_full() else {
            tracing::warn!("No previously applied configuration to restore");
            return ReconcileError::Apply {
                context,
                source,
                rollback: RollbackOutcome::NothingToRestore,
            };
        };

        let restored = self
            .rollback_policy
            .run("rollback", || self.admin.apply(&previous.document))
            .await;
        match restored.result {
            Ok(()) => {
                self.metrics.rollback(true);
                tracing::warn!(
                    fingerprint = %short(&previous.fingerprint),
                    "Rolled back to previously applied configuration"
                );
                ReconcileError::Apply {
                    context,
                    source,
                    rollback: RollbackOutcome::Restored { fingerprint: previous.fingerprint.clone() },
                }
            }
            Err(rollback) => {
                self.metrics.rollback(false);
                tracing::error!(
                    alarm = true,
                    fingerprint = %short(&previous.fingerprint),
                    attempts = restored.attempts,
                    error = %rollback,
                    "Rollback failed; engine configuration state is unknown"
                );
                ReconcileError::RollbackFailed {
                    context,
                    apply: source,
                    rollback,
                    previous_fingerprint: previous.fingerprint.clone(),
                }
            }
        }
    }

    async fn verify_applied(&self, applied: &Document) -> VerifyOutcome {
        if !self.verify {
            return VerifyOutcome::Disabled;
        }
        if self.coalescer.is_dirty() {
            tracing::debug!("Follow-up cycle pending, skipping verification");
            return VerifyOutcome::Skipped;
        }

        self.set_phase(Phase::Verifying);
        match self.admin.fetch().await {
            Ok(active) => {
                let differences = verify::differences(applied.as_value(), active.as_value());
                if differences.is_empty() {
                    VerifyOutcome::Matched
                } else {
                    tracing::warn!(
                        count = differences.len(),
                        first = %differences[0],
                        "Active configuration differs from applied configuration"
                    );
                    VerifyOutcome::Mismatch { differences }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read back active configuration");
                VerifyOutcome::Unavailable { error: e.to_string() }
            }
        }
    }

    async fn persist(&self, record: &AppliedRecord) {
        let Some(file) = &self.record_file else {
            return;
        };
        // The engine already runs this document; a failed write only costs
        // rollback ability after a restart.
        if let Err(e) = file.save(record).await {
            tracing::error!(path = ?file.path(), error = %e, "Failed to persist applied configuration record");
        }
    }
}
