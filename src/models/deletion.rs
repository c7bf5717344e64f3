// src/models/deletion.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// Mapeia o CREATE TYPE deletion_job_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "deletion_job_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeletionJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl DeletionJobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeletionJobStatus::Completed | DeletionJobStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletionJob {
    pub id: Uuid,
    pub endpoint_id: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: DeletionJobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Item da listagem de exclusões pendentes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PendingDeletion {
    pub endpoint_id: String,
    pub job_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub attempts: i32,
}

// --- EVENTOS DE AUDITORIA DO CICLO DE VIDA ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEventType {
    SoftDeleted,
    Restored,
    ForceDeleted,
    PermanentlyDeleted,
}

impl LifecycleEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventType::SoftDeleted => "soft_deleted",
            LifecycleEventType::Restored => "restored",
            LifecycleEventType::ForceDeleted => "force_deleted",
            LifecycleEventType::PermanentlyDeleted => "permanently_deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub id: i64,
    pub endpoint_id: String,
    pub event_type: String,
    pub actor: String,
    pub reason: Option<String>,
    pub job_id: Option<Uuid>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

// --- RESPOSTAS DAS OPERAÇÕES ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SoftDeleteResult {
    pub endpoint_id: String,
    pub job_id: Option<Uuid>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub permanently_deleted: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub endpoint_id: String,
    pub restored_at: DateTime<Utc>,
}

/// Como terminou uma execução da exclusão definitiva.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Completed,
    /// Job já não está pendente (concluído, cancelado por restore, esgotado).
    JobNotPending,
    /// Endpoint não está mais soft-deleted por este job.
    EndpointNotSoftDeleted,
    /// Mensagem chegou antes do horário agendado.
    NotDue,
}
