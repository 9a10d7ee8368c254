//! External engine subsystem.
//!
//! # Data Flow
//! ```text
//! Validation (before anything goes live):
//!     document text
//!     → validator.rs (syntax gate)
//!     → adapter.rs (ConfigAdapter capability)
//!     → process.rs (`<engine> adapt`, or an in-process fake in tests)
//!     → canonical Document | AdaptError with the engine's diagnostic
//!
//! Apply / read-back:
//!     Document
//!     → admin.rs (POST /load, GET /config/)
//!     → Ok | AdminError (refused / timeout / 4xx / 5xx)
//! ```
//!
//! # Design Decisions
//! - Both seams are traits so reconciliation runs without spawning processes
//! - Engine diagnostics are passed through verbatim, never summarized
//! - Every call carries a bounded timeout
//! - Error values are `Clone` so one outcome can be handed to many callers

pub mod adapter;
pub mod admin;
pub mod process;
pub mod validator;
pub mod version;

pub use adapter::{AdaptError, ConfigAdapter};
pub use admin::{AdminClient, AdminError, EngineAdmin};
pub use process::ProcessAdapter;
pub use validator::Validator;
pub use version::{check_compatibility, EngineVersion};
