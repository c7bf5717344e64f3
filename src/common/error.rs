// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Validações que não cabem num derive (ex: telefone não normalizável)
    #[error("Campo inválido: {field} ({code})")]
    InvalidField { field: &'static str, code: &'static str },

    #[error("Status inválido: {0}")]
    InvalidStatus(String),

    #[error("{entity} '{id}' não encontrado")]
    NotFound { entity: &'static str, id: String },

    // Pré-condição da máquina de estados violada
    #[error("Conflito: {message}")]
    Conflict { message: String, current_state: Value },

    #[error("Janela de restauração expirada em {scheduled_at}")]
    WindowExpired { scheduled_at: DateTime<Utc> },

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AppError::NotFound { entity, id: id.to_string() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_)
            | AppError::InvalidField { .. }
            | AppError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::WindowExpired { .. } => StatusCode::GONE,
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let codes: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), codes);
                }
                json!({
                    "error": "validation_error",
                    "message": "Um ou mais campos são inválidos.",
                    "details": details,
                })
            }
            AppError::InvalidField { field, code } => json!({
                "error": "validation_error",
                "message": "Um ou mais campos são inválidos.",
                "details": { field: [code] },
            }),
            AppError::InvalidStatus(value) => json!({
                "error": "invalid_status",
                "message": format!("O status '{}' não é reconhecido.", value),
            }),
            e @ AppError::NotFound { .. } => json!({
                "error": "not_found",
                "message": e.to_string(),
            }),
            AppError::Conflict { message, current_state } => json!({
                "error": "conflict",
                "message": message,
                "currentState": current_state,
            }),
            AppError::WindowExpired { scheduled_at } => json!({
                "error": "window_expired",
                "message": "O período de restauração deste endpoint já expirou.",
                "scheduledPermanentDeletionAt": scheduled_at,
            }),

            // Erros de persistência viram 500, com correlation id no log e na resposta.
            e => {
                let correlation_id = Uuid::new_v4();
                tracing::error!(%correlation_id, error = %e, "Erro Interno do Servidor");
                json!({
                    "error": "internal_error",
                    "message": "Ocorreu um erro inesperado.",
                    "correlationId": correlation_id,
                })
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(AppError::not_found("Lead", 42).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::InvalidStatus("archived".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::WindowExpired { scheduled_at: Utc::now() }.status_code(),
            StatusCode::GONE
        );
        assert_eq!(
            AppError::Conflict { message: "x".into(), current_state: Value::Null }.status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn store_errors_map_to_500() {
        let err = AppError::DatabaseError(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = AppError::not_found("Endpoint", "ep_solar");
        assert_eq!(err.to_string(), "Endpoint 'ep_solar' não encontrado");
    }
}
