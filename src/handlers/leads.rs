// src/handlers/leads.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::lead::{LeadActivity, LeadStatus, LeadStatusHistory, LeadSubmission, StatusChangeMeta, SubmitLeadResponse},
};

// =============================================================================
//  INGESTÃO
// =============================================================================

// POST /api/endpoints/{endpoint_id}/leads
#[utoipa::path(
    post,
    path = "/api/endpoints/{endpoint_id}/leads",
    tag = "Leads",
    request_body = LeadSubmission,
    params(
        ("endpoint_id" = String, Path, description = "Endpoint que recebeu o lead")
    ),
    responses(
        (status = 201, description = "Lead registrado (roteado ou não)", body = SubmitLeadResponse),
        (status = 400, description = "Telefone, nome ou campos inválidos"),
        (status = 404, description = "Endpoint inexistente ou inativo")
    )
)]
pub async fn submit_lead(
    State(app_state): State<AppState>,
    Path(endpoint_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    // O JSON bruto é guardado como cópia de auditoria
    let response = app_state.lead_service.submit_lead(&endpoint_id, payload).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

// =============================================================================
//  STATUS E HISTÓRICO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadStatusPayload {
    #[validate(length(min = 1, message = "required"))]
    #[schema(example = "contacted")]
    pub status: String,

    #[validate(length(max = 500, message = "too_long"))]
    #[schema(example = "Cliente retornou a ligação")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadStatusChanged {
    pub lead_id: i64,
    pub old_status: LeadStatus,
    pub new_status: LeadStatus,
}

// PATCH /api/leads/{lead_id}/status
#[utoipa::path(
    patch,
    path = "/api/leads/{lead_id}/status",
    tag = "Leads",
    request_body = UpdateLeadStatusPayload,
    params(
        ("lead_id" = i64, Path, description = "ID do lead"),
        ("x-actor-id" = Option<String>, Header, description = "Operador responsável")
    ),
    responses(
        (status = 200, description = "Status alterado", body = LeadStatusChanged),
        (status = 400, description = "Status fora da enumeração"),
        (status = 404, description = "Lead não encontrado")
    )
)]
pub async fn update_lead_status(
    State(app_state): State<AppState>,
    Path(lead_id): Path<i64>,
    actor: Actor,
    Json(payload): Json<UpdateLeadStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let new_status: LeadStatus = payload.status.parse()?;
    let meta = StatusChangeMeta { actor: actor.0, reason: payload.reason };

    let old_status = app_state.lead_service.update_lead_status(lead_id, new_status, &meta).await?;

    Ok((StatusCode::OK, Json(LeadStatusChanged { lead_id, old_status, new_status })))
}

// GET /api/leads/{lead_id}/history
#[utoipa::path(
    get,
    path = "/api/leads/{lead_id}/history",
    tag = "Leads",
    params(
        ("lead_id" = i64, Path, description = "ID do lead")
    ),
    responses(
        (status = 200, description = "Histórico de status, em ordem", body = Vec<LeadStatusHistory>),
        (status = 404, description = "Lead não encontrado")
    )
)]
pub async fn lead_history(
    State(app_state): State<AppState>,
    Path(lead_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state.lead_service.lead_history(lead_id).await?;

    Ok((StatusCode::OK, Json(history)))
}

// GET /api/leads/{lead_id}/activities
#[utoipa::path(
    get,
    path = "/api/leads/{lead_id}/activities",
    tag = "Leads",
    params(
        ("lead_id" = i64, Path, description = "ID do lead")
    ),
    responses(
        (status = 200, description = "Linha do tempo do lead", body = Vec<LeadActivity>),
        (status = 404, description = "Lead não encontrado")
    )
)]
pub async fn lead_activities(
    State(app_state): State<AppState>,
    Path(lead_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let activities = app_state.lead_service.lead_activities(lead_id).await?;

    Ok((StatusCode::OK, Json(activities)))
}
