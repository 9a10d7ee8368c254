//! Config document builder subsystem.
//!
//! # Data Flow
//! ```text
//! DesiredState (snapshot)
//!     → compose.rs (filter hosts, order by specificity, compose handler chains)
//!     → document.rs (typed engine JSON → canonical Document)
//!     → BuildOutput { document, warnings }
//! ```
//!
//! # Design Decisions
//! - Pure: never touches the network or the store
//! - Full rebuild from the snapshot on every cycle, never a diff
//! - Problem hosts are dropped with a warning, the rest still ship
//! - Deterministic: hosts sorted by id before any decision is made

pub mod compose;
pub mod document;
pub mod warnings;

pub use compose::{BuildOutput, Builder};
pub use document::Document;
pub use warnings::{BuildWarning, WarningKind};
