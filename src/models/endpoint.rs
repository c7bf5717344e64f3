// src/models/endpoint.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::routing::RoutingMode;

// --- ENDPOINT (webhook de entrada) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[schema(example = "ep_solar_ca")]
    pub id: String,
    pub name: String,
    #[schema(example = "lead")]
    pub category: String,
    pub is_active: bool,
    pub routing_mode: RoutingMode,

    // Estatísticas
    pub total_leads: i64,
    pub last_lead_at: Option<DateTime<Utc>>,
    pub total_forwarded: i64,
    pub total_forward_failures: i64,

    // Ciclo de vida
    pub deleted_at: Option<DateTime<Utc>>,
    pub scheduled_permanent_deletion_at: Option<DateTime<Utc>>,
    pub deletion_reason: Option<String>,
    pub deleted_by: Option<String>,
    pub deletion_job_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Estado derivado dos campos de exclusão. `PermanentlyDeleted` é a ausência da linha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EndpointState {
    Active,
    SoftDeleted {
        #[serde(rename = "scheduledAt")]
        scheduled_at: DateTime<Utc>,
        #[serde(rename = "jobId")]
        job_id: Option<Uuid>,
    },
}

impl Endpoint {
    pub fn state(&self) -> EndpointState {
        match (self.deleted_at, self.scheduled_permanent_deletion_at) {
            (Some(deleted_at), scheduled) => EndpointState::SoftDeleted {
                // Sem agendamento registrado, a janela é considerada fechada
                scheduled_at: scheduled.unwrap_or(deleted_at),
                job_id: self.deletion_job_id,
            },
            (None, _) => EndpointState::Active,
        }
    }

    /// Aceita novas submissões?
    pub fn accepts_submissions(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}
