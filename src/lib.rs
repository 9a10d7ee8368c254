//! hostplane: reverse-proxy configuration control plane library

// Desired state
pub mod model;
pub mod store;

// Reconciliation core
pub mod builder;
pub mod engine;
pub mod reconciler;

// Management surface
pub mod api;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::HostplaneConfig;
pub use lifecycle::Shutdown;
pub use reconciler::Reconciler;
