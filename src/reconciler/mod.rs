//! Reconciliation subsystem.
//!
//! # States
//! ```text
//! Idle → Building → Validating → Applying → Verifying → Idle
//!                        │            │
//!                        │            └─(apply fails twice)→ RolledBack
//!                        └─(engine rejects text)→ Idle
//! ```
//!
//! # Coalescing
//! ```text
//! trigger while Idle     → Running, spawn cycle N
//! trigger while Running  → Dirty (caller waits for cycle N+1)
//! trigger while Dirty    → Dirty (same N+1, never a queue)
//! cycle N finishes       → Dirty ? run N+1 : Idle
//! ```
//!
//! # Design Decisions
//! - One writer: a single state machine admits cycles, no ad hoc flags
//! - Cycles run on their own task; a dropped caller never aborts an apply
//! - Every retry is bounded (apply: 2 attempts, rollback: configured)
//! - Verify mismatches are reported, never rolled back
//! - The applied record is replaced whole, only after a successful apply

pub mod coalesce;
pub mod cycle;
pub mod error;
pub mod record;
pub mod verify;

pub use coalesce::{Coalescer, RunState};
pub use cycle::{Phase, ReconcileReport, Reconciler, ReconcilerStatus, VerifyOutcome};
pub use error::{CycleContext, ReconcileError, RollbackOutcome};
pub use record::{AppliedRecord, RecordError, RecordFile};
