// src/models/appointment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{forwarding::DeliveryOutcome, routing::RoutingMethod};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: i64,
    pub lead_id: i64,
    pub contact_id: i64,
    pub workspace_id: Option<String>,
    pub routing_method: RoutingMethod,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
    pub notes: Option<String>,
    pub product_type: Option<String>,
    pub zip_code: Option<String>,
    pub raw_payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub lead_id: i64,
    pub contact_id: i64,
    pub workspace_id: Option<String>,
    pub routing_method: RoutingMethod,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub timezone: Option<String>,
    pub notes: Option<String>,
    pub product_type: Option<String>,
    pub zip_code: Option<String>,
    pub raw_payload: Value,
}

// --- PAYLOAD DE ENTRADA ---

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerFields {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    #[schema(example = "(310) 555-0199")]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[schema(example = "90210")]
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFields {
    pub scheduled_for: Option<DateTime<Utc>>,
    #[validate(range(min = 5, max = 1440, message = "invalid_duration"))]
    pub duration_minutes: Option<i32>,
    #[schema(example = "America/Los_Angeles")]
    pub timezone: Option<String>,
    pub notes: Option<String>,
    #[schema(example = "Solar")]
    pub product_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    // Destino pré-selecionado (roteamento por prioridade)
    #[schema(example = "ws_west")]
    pub destination_hint: Option<String>,
    // Lead existente; sem ele, um lead `scheduled` é criado
    pub lead_id: Option<i64>,
    // Endpoint de origem, obrigatório quando não há lead_id
    #[schema(example = "ep_solar_ca")]
    pub endpoint_id: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub customer: CustomerFields,
    #[validate(nested)]
    #[serde(default)]
    pub schedule: ScheduleFields,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentResponse {
    pub contact_id: i64,
    pub lead_id: i64,
    pub appointment_id: i64,
    pub matched_destination: Option<String>,
    pub routing_method: RoutingMethod,
    pub deliveries: Vec<DeliveryOutcome>,
}
