// src/models/forwarding.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// Registro imutável de uma tentativa de entrega
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingLogEntry {
    pub id: i64,
    pub lead_id: i64,
    pub contact_id: i64,
    pub appointment_id: Option<i64>,
    pub source_endpoint_id: Option<String>,
    pub workspace_id: String,
    pub rule_id: Option<i64>,
    pub destination_url: Option<String>,
    pub success: bool,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub matched_product: Option<String>,
    pub matched_zip: Option<String>,
    pub payload_snapshot: String,
    pub duration_ms: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewForwardingLog {
    pub lead_id: i64,
    pub contact_id: i64,
    pub appointment_id: Option<i64>,
    pub source_endpoint_id: Option<String>,
    pub workspace_id: String,
    pub rule_id: Option<i64>,
    pub destination_url: Option<String>,
    pub success: bool,
    pub status_code: Option<i32>,
    pub response_body: Option<String>,
    pub error_message: Option<String>,
    pub matched_product: Option<String>,
    pub matched_zip: Option<String>,
    pub payload_snapshot: String,
    pub duration_ms: i32,
}

/// Resultado informativo de uma entrega, devolvido a quem submeteu.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub workspace_id: String,
    pub rule_id: Option<i64>,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}
