use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::api::{ApiError, ApiState};
use crate::model::{AccessList, AccessListId, Certificate, CertificateId, HostId, ProxyHost, SecurityPolicy};
use crate::reconciler::{ReconcileReport, ReconcilerStatus};

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub revision: u64,
    pub reconciler: ReconcilerStatus,
}

/// A committed change and the cycle that pushed it to the engine.
#[derive(Serialize)]
pub struct Mutation<T> {
    pub data: T,
    pub reconcile: ReconcileReport,
}

type MutationResult<T> = Result<Json<Mutation<T>>, ApiError>;

async fn converge<T: Serialize>(state: &ApiState, reason: &str, data: T) -> MutationResult<T> {
    tracing::info!(reason, "Desired state changed");
    let reconcile = state.reconciler.trigger(reason).await?;
    Ok(Json(Mutation { data, reconcile }))
}

pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        revision: state.store.revision().await,
        reconciler: state.reconciler.status(),
    })
}

pub async fn post_reconcile(State(state): State<ApiState>) -> Result<Json<ReconcileReport>, ApiError> {
    Ok(Json(state.reconciler.trigger("api request").await?))
}

pub async fn list_hosts(State(state): State<ApiState>) -> Json<Vec<ProxyHost>> {
    Json(state.store.list_hosts().await)
}

pub async fn get_host(State(state): State<ApiState>, Path(id): Path<HostId>) -> Result<Json<ProxyHost>, ApiError> {
    Ok(Json(state.store.get_host(id).await?))
}

pub async fn create_host(
    State(state): State<ApiState>,
    Json(host): Json<ProxyHost>,
) -> Result<(StatusCode, Json<Mutation<ProxyHost>>), ApiError> {
    let host = state.store.create_host(host).await?;
    let body = converge(&state, "host created", host).await?;
    Ok((StatusCode::CREATED, body))
}

pub async fn update_host(
    State(state): State<ApiState>,
    Path(id): Path<HostId>,
    Json(host): Json<ProxyHost>,
) -> MutationResult<ProxyHost> {
    let host = state.store.update_host(id, host).await?;
    converge(&state, "host updated", host).await
}

pub async fn enable_host(State(state): State<ApiState>, Path(id): Path<HostId>) -> MutationResult<ProxyHost> {
    let host = state.store.set_host_enabled(id, true).await?;
    converge(&state, "host enabled", host).await
}

pub async fn disable_host(State(state): State<ApiState>, Path(id): Path<HostId>) -> MutationResult<ProxyHost> {
    let host = state.store.set_host_enabled(id, false).await?;
    converge(&state, "host disabled", host).await
}

pub async fn delete_host(State(state): State<ApiState>, Path(id): Path<HostId>) -> MutationResult<ProxyHost> {
    let host = state.store.delete_host(id).await?;
    converge(&state, "host deleted", host).await
}

pub async fn list_access_lists(State(state): State<ApiState>) -> Json<Vec<AccessList>> {
    Json(state.store.list_access_lists().await)
}

pub async fn create_access_list(
    State(state): State<ApiState>,
    Json(list): Json<AccessList>,
) -> Result<(StatusCode, Json<Mutation<AccessList>>), ApiError> {
    let list = state.store.create_access_list(list).await?;
    let body = converge(&state, "access list created", list).await?;
    Ok((StatusCode::CREATED, body))
}

pub async fn update_access_list(
    State(state): State<ApiState>,
    Path(id): Path<AccessListId>,
    Json(list): Json<AccessList>,
) -> MutationResult<AccessList> {
    let list = state.store.update_access_list(id, list).await?;
    converge(&state, "access list updated", list).await
}

pub async fn delete_access_list(
    State(state): State<ApiState>,
    Path(id): Path<AccessListId>,
) -> MutationResult<AccessList> {
    let list = state.store.delete_access_list(id).await?;
    converge(&state, "access list deleted", list).await
}

pub async fn list_certificates(State(state): State<ApiState>) -> Json<Vec<Certificate>> {
    Json(state.store.list_certificates().await)
}

pub async fn create_certificate(
    State(state): State<ApiState>,
    Json(cert): Json<Certificate>,
) -> Result<(StatusCode, Json<Mutation<Certificate>>), ApiError> {
    let cert = state.store.create_certificate(cert).await?;
    let body = converge(&state, "certificate created", cert).await?;
    Ok((StatusCode::CREATED, body))
}

pub async fn delete_certificate(
    State(state): State<ApiState>,
    Path(id): Path<CertificateId>,
) -> MutationResult<Certificate> {
    let cert = state.store.delete_certificate(id).await?;
    converge(&state, "certificate deleted", cert).await
}

pub async fn get_policy(State(state): State<ApiState>) -> Json<SecurityPolicy> {
    Json(state.store.policy().await)
}

pub async fn put_policy(
    State(state): State<ApiState>,
    Json(policy): Json<SecurityPolicy>,
) -> MutationResult<SecurityPolicy> {
    let policy = state.store.set_policy(policy).await?;
    converge(&state, "security policy updated", policy).await
}
