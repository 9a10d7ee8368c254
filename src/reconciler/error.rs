//! Reconciliation error taxonomy.
//!
//! Every cycle failure carries a [`CycleContext`] so the operator can tell
//! which document, which domains and which cycle were involved without
//! digging through logs. All variants are `Clone`: one result is shared by
//! every caller coalesced into the same cycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::{AdaptError, AdminError};
use crate::store::StoreError;

/// Identifies the cycle an error belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleContext {
    pub cycle_id: Uuid,
    pub generation: u64,
    /// Store revision the cycle was built from.
    pub revision: u64,
    /// Fingerprint of the document the cycle tried to apply.
    pub fingerprint: String,
    pub at: DateTime<Utc>,
    /// Domains of every enabled host in the snapshot.
    pub domains: Vec<String>,
}

pub(crate) fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

impl fmt::Display for CycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cycle {} (revision {}, document {}, {} domains)",
            self.cycle_id,
            self.revision,
            short(&self.fingerprint),
            self.domains.len()
        )
    }
}

/// What happened to the engine after an apply failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RollbackOutcome {
    /// The previously applied document is active again.
    Restored { fingerprint: String },
    /// Nothing was ever applied, so there was nothing to restore.
    NothingToRestore,
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackOutcome::Restored { fingerprint } => {
                write!(f, "restored previous configuration {}", short(fingerprint))
            }
            RollbackOutcome::NothingToRestore => write!(f, "no previous configuration to restore"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("could not snapshot desired state: {0}")]
    Snapshot(#[from] StoreError),

    /// The engine's adapter rejected the built text. The engine was not touched.
    #[error("{context}: engine rejected the configuration: {source}")]
    Validation {
        context: CycleContext,
        source: AdaptError,
    },

    /// Apply failed twice; `rollback` says what state the engine was left in.
    #[error("{context}: applying configuration failed: {source}; {rollback}")]
    Apply {
        context: CycleContext,
        source: AdminError,
        rollback: RollbackOutcome,
    },

    /// Apply and rollback both failed. The engine's active state is unknown.
    #[error(
        "{context}: applying configuration failed ({apply}) and restoring {} also failed ({rollback}); engine state unknown",
        short(previous_fingerprint)
    )]
    RollbackFailed {
        context: CycleContext,
        apply: AdminError,
        rollback: AdminError,
        previous_fingerprint: String,
    },

    #[error("reconciliation stopped before reporting a result")]
    Interrupted,
}

impl ReconcileError {
    /// Every value `stage()` can return.
    pub const STAGES: [&'static str; 5] = ["snapshot", "validation", "apply", "rollback", "interrupted"];

    pub fn context(&self) -> Option<&CycleContext> {
        match self {
            ReconcileError::Validation { context, .. }
            | ReconcileError::Apply { context, .. }
            | ReconcileError::RollbackFailed { context, .. } => Some(context),
            ReconcileError::Snapshot(_) | ReconcileError::Interrupted => None,
        }
    }

    /// Stable label for logs, metrics and API bodies.
    pub fn stage(&self) -> &'static str {
        match self {
            ReconcileError::Snapshot(_) => "snapshot",
            ReconcileError::Validation { .. } => "validation",
            ReconcileError::Apply { .. } => "apply",
            ReconcileError::RollbackFailed { .. } => "rollback",
            ReconcileError::Interrupted => "interrupted",
        }
    }

    /// True when an operator has to intervene.
    pub fn is_alarm(&self) -> bool {
        matches!(self, ReconcileError::RollbackFailed { .. })
    }

    /// Engine-side diagnostic text, when the engine produced one.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            ReconcileError::Validation { source, .. } => source.diagnostic(),
            _ => None,
        }
    }
}
