//! Startup orchestration.
//!
//! # Responsibilities
//! - Check the engine's reported version against the configured minimum
//! - Restore the persisted applied record
//! - Run the initial reconciliation
//!
//! # Design Decisions
//! - Fail fast on incompatibility: nothing we build would load
//! - A missing or corrupt record only disables rollback for the first cycle

use thiserror::Error;

use crate::engine::version::check_compatibility;
use crate::engine::{AdaptError, ConfigAdapter};
use crate::reconciler::Reconciler;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("engine is not usable: {0}")]
    Engine(#[from] AdaptError),
}

/// Brings the reconciler into a state where it can safely serve triggers.
pub async fn preflight(
    adapter: &dyn ConfigAdapter,
    min_version: &str,
    reconciler: &Reconciler,
) -> Result<(), StartupError> {
    let reported = adapter.version().await?;
    let version = check_compatibility(&reported, min_version)?;
    tracing::info!(engine_version = %version, minimum = min_version, "Engine version accepted");

    match reconciler.restore_record().await {
        Ok(Some(_)) => {}
        Ok(None) => tracing::info!("No applied configuration record; first cycle cannot roll back"),
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable applied configuration record"),
    }

    match reconciler.trigger("startup").await {
        Ok(report) => tracing::info!(
            fingerprint = %report.fingerprint,
            routes = report.routes,
            "Initial reconciliation complete"
        ),
        Err(e) => tracing::error!(error = %e, stage = e.stage(), "Initial reconciliation failed"),
    }
    Ok(())
}
