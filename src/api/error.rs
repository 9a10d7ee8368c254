//! API error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::reconciler::ReconcileError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The change was stored but the engine did not converge.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    diagnostic: Option<&'a str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Duplicate { .. })
            | ApiError::Store(StoreError::DomainConflict { .. })
            | ApiError::Store(StoreError::InUse { .. }) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(StoreError::StateFile(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Reconcile(ReconcileError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Reconcile(ReconcileError::Apply { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Reconcile(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::Store(StoreError::NotFound { .. }) => "not_found",
            ApiError::Store(StoreError::Duplicate { .. }) => "duplicate",
            ApiError::Store(StoreError::DomainConflict { .. }) => "domain_conflict",
            ApiError::Store(StoreError::InUse { .. }) => "in_use",
            ApiError::Store(StoreError::Invalid(_)) => "invalid",
            ApiError::Store(StoreError::StateFile(_)) => "state_file",
            ApiError::Reconcile(e) => match e.stage() {
                "validation" => "engine_rejected",
                "apply" => "apply_failed",
                "rollback" => "rollback_failed",
                _ => "reconcile_failed",
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let diagnostic = match &self {
            ApiError::Reconcile(e) => e.diagnostic(),
            ApiError::Store(_) => None,
        };
        let body = ErrorBody {
            error: self.label(),
            detail: self.to_string(),
            diagnostic,
        };
        (status, Json(body)).into_response()
    }
}
