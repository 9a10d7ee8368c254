//! Desired-state store subsystem.
//!
//! # Data Flow
//! ```text
//! API handlers / state file
//!     → memory.rs (validated writes under one RwLock, revision bump)
//!     → DesiredStateSource::snapshot (read-consistent copy)
//!     → reconciler
//!
//! On state file change:
//!     watcher.rs detects change
//!     → state_file.rs parses the file
//!     → MemoryStore::replace swaps every table at once
//!     → reconciler triggered
//! ```
//!
//! # Design Decisions
//! - A snapshot is taken under a single read lock: no per-entity reads
//! - Referential integrity is enforced on write (in-use deletes are refused)
//! - Enabled hosts may not share a domain name

pub mod memory;
pub mod state_file;
pub mod watcher;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DesiredState, HostId, ModelError};

pub use memory::MemoryStore;
pub use state_file::{load_state_file, StateFile};
pub use watcher::StateWatcher;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: u64 },

    #[error("domain {domain} is already served by host {host_id}")]
    DomainConflict { domain: String, host_id: HostId },

    #[error("{entity} {id} is still referenced by hosts {hosts:?}")]
    InUse { entity: &'static str, id: u64, hosts: Vec<HostId> },

    #[error("invalid input: {}", join(.0))]
    Invalid(Vec<ModelError>),

    #[error("state file error: {0}")]
    StateFile(String),
}

fn join(errors: &[ModelError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Read access to the full desired state.
#[async_trait]
pub trait DesiredStateSource: Send + Sync {
    /// A read-consistent copy of every stored entity.
    async fn snapshot(&self) -> Result<DesiredState, StoreError>;
}
