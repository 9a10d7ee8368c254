//! Management HTTP API.
//!
//! # Data Flow
//! ```text
//! request → TraceLayer → TimeoutLayer → bearer auth → handler
//!     handler: validate → commit to store → trigger reconcile → respond
//! ```
//!
//! # Design Decisions
//! - The store commit happens before reconciliation; a failed cycle leaves
//!   the change stored and the response says why the engine did not follow
//! - Every route requires the API key, including reads

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::reconciler::Reconciler;
use crate::store::MemoryStore;

use self::auth::api_auth_middleware;
use self::handlers::*;

pub use self::error::ApiError;

/// State injected into handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<MemoryStore>,
    pub reconciler: Reconciler,
    pub api_key: Arc<str>,
}

impl ApiState {
    pub fn new(store: Arc<MemoryStore>, reconciler: Reconciler, api_key: &str) -> Self {
        Self { store, reconciler, api_key: Arc::from(api_key) }
    }
}

#[allow(deprecated)]
pub fn router(state: ApiState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/reconcile", post(post_reconcile))
        .route("/hosts", get(list_hosts).post(create_host))
        .route("/hosts/{id}", get(get_host).put(update_host).delete(delete_host))
        .route("/hosts/{id}/enable", post(enable_host))
        .route("/hosts/{id}/disable", post(disable_host))
        .route("/access-lists", get(list_access_lists).post(create_access_list))
        .route("/access-lists/{id}", delete(delete_access_list).put(update_access_list))
        .route("/certificates", get(list_certificates).post(create_certificate))
        .route("/certificates/{id}", delete(delete_certificate))
        .route("/policy", get(get_policy).put(put_policy))
        .layer(middleware::from_fn_with_state(state.clone(), api_auth_middleware))
        .with_state(state);

    Router::new().nest("/api", api).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(request_timeout)),
    )
}
