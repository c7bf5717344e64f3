// src/handlers/endpoints.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use futures::TryStreamExt;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::deletion::{LifecycleEvent, PendingDeletion, RestoreResult, SoftDeleteResult},
};

// =============================================================================
//  CICLO DE VIDA DO ENDPOINT
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteEndpointParams {
    /// Motivo registrado na auditoria
    pub reason: Option<String>,
    /// Exclui na hora, sem janela de restauração
    #[serde(default)]
    pub force: bool,
}

// DELETE /api/endpoints/{endpoint_id}
#[utoipa::path(
    delete,
    path = "/api/endpoints/{endpoint_id}",
    tag = "Endpoints",
    params(
        ("endpoint_id" = String, Path, description = "ID do endpoint"),
        ("x-actor-id" = Option<String>, Header, description = "Operador responsável"),
        DeleteEndpointParams
    ),
    responses(
        (status = 200, description = "Endpoint marcado para exclusão (ou excluído, com force)", body = SoftDeleteResult),
        (status = 404, description = "Endpoint não encontrado"),
        (status = 409, description = "Endpoint já marcado para exclusão")
    )
)]
pub async fn soft_delete_endpoint(
    State(app_state): State<AppState>,
    Path(endpoint_id): Path<String>,
    Query(params): Query<DeleteEndpointParams>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let result = app_state
        .lifecycle_service
        .soft_delete_endpoint(&endpoint_id, params.reason.as_deref(), actor.as_str(), params.force)
        .await?;

    Ok((StatusCode::OK, Json(result)))
}

// POST /api/endpoints/{endpoint_id}/restore
#[utoipa::path(
    post,
    path = "/api/endpoints/{endpoint_id}/restore",
    tag = "Endpoints",
    params(
        ("endpoint_id" = String, Path, description = "ID do endpoint"),
        ("x-actor-id" = Option<String>, Header, description = "Operador responsável")
    ),
    responses(
        (status = 200, description = "Endpoint restaurado", body = RestoreResult),
        (status = 404, description = "Endpoint não está marcado para exclusão"),
        (status = 410, description = "Janela de restauração expirada")
    )
)]
pub async fn restore_endpoint(
    State(app_state): State<AppState>,
    Path(endpoint_id): Path<String>,
    actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let result = app_state
        .lifecycle_service
        .restore_endpoint(&endpoint_id, actor.as_str())
        .await?;

    Ok((StatusCode::OK, Json(result)))
}

// GET /api/endpoints/{endpoint_id}/events
#[utoipa::path(
    get,
    path = "/api/endpoints/{endpoint_id}/events",
    tag = "Endpoints",
    params(
        ("endpoint_id" = String, Path, description = "ID do endpoint")
    ),
    responses(
        (status = 200, description = "Auditoria do ciclo de vida", body = Vec<LifecycleEvent>)
    )
)]
pub async fn lifecycle_events(
    State(app_state): State<AppState>,
    Path(endpoint_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let events = app_state.lifecycle_service.lifecycle_events(&endpoint_id).await?;

    Ok((StatusCode::OK, Json(events)))
}

// GET /api/deletions/pending
#[utoipa::path(
    get,
    path = "/api/deletions/pending",
    tag = "Endpoints",
    responses(
        (status = 200, description = "Exclusões agendadas ainda abertas", body = Vec<PendingDeletion>)
    )
)]
pub async fn list_pending_deletions(State(app_state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let pending: Vec<PendingDeletion> = app_state
        .lifecycle_service
        .list_pending_deletions()
        .try_collect()
        .await?;

    Ok((StatusCode::OK, Json(pending)))
}
