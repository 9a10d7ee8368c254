//! Domain model subsystem.
//!
//! # Data Flow
//! ```text
//! API handler / state file
//!     → validation.rs (hostname, CIDR, country code checks)
//!     → store (persisted rows)
//!     → snapshot.rs (DesiredState, read-consistent aggregate)
//!     → builder (engine document)
//! ```
//!
//! # Design Decisions
//! - Pure data: no I/O, no engine knowledge
//! - Cross-entity references are ids, never owning pointers
//! - Domain names are stored lowercased

pub mod access_list;
pub mod certificate;
pub mod proxy_host;
pub mod security;
pub mod snapshot;
pub mod validation;

pub use access_list::{AccessList, AccessListId, AccessListKind};
pub use certificate::{Certificate, CertificateId};
pub use proxy_host::{HostFeatures, HostId, Location, ProxyHost, Upstream, UpstreamScheme};
pub use security::{IntrusionDetection, PolicyMode, SecurityPolicy};
pub use snapshot::DesiredState;
pub use validation::ModelError;
