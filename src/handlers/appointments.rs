// src/handlers/appointments.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::Value;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::appointment::{AppointmentRequest, AppointmentResponse},
};

// POST /api/appointments
#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "Agendamentos",
    request_body = AppointmentRequest,
    params(
        ("x-actor-id" = Option<String>, Header, description = "Operador responsável")
    ),
    responses(
        (status = 201, description = "Agendamento registrado", body = AppointmentResponse),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Lead ou endpoint não encontrado")
    )
)]
pub async fn submit_appointment(
    State(app_state): State<AppState>,
    actor: Actor,
    // JSON cru: o payload original vira a cópia de auditoria
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let response = app_state
        .appointment_service
        .submit_appointment(payload, actor.as_str())
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}
