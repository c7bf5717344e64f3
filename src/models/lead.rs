// src/models/lead.rs

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    common::error::AppError,
    models::{forwarding::DeliveryOutcome, routing::RoutingMethod},
};

// --- ENUMS ---

// Mapeia o CREATE TYPE lead_status do banco.
// Enumeração aberta: qualquer valor pode suceder qualquer outro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    ProposalSent,
    Negotiating,
    Scheduled,
    Converted,
    Rejected,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 9] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::ProposalSent,
        LeadStatus::Negotiating,
        LeadStatus::Scheduled,
        LeadStatus::Converted,
        LeadStatus::Rejected,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::ProposalSent => "proposal_sent",
            LeadStatus::Negotiating => "negotiating",
            LeadStatus::Scheduled => "scheduled",
            LeadStatus::Converted => "converted",
            LeadStatus::Rejected => "rejected",
            LeadStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_lowercase();
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| AppError::InvalidStatus(value.to_string()))
    }
}

// --- LEAD ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: i64,
    pub contact_id: i64,
    pub endpoint_id: String,
    #[schema(example = "Solar")]
    pub product_type: Option<String>,
    #[schema(example = "90210")]
    pub zip_code: Option<String>,
    pub status: LeadStatus,
    pub revenue_estimate: Option<Decimal>,
    pub assigned_workspace_id: Option<String>,
    pub priority: i32,
    // Cópia imutável da submissão original
    pub raw_payload: Value,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Campos do lead a inserir (o contato já foi resolvido).
#[derive(Debug, Clone)]
pub struct NewLead {
    pub endpoint_id: String,
    pub product_type: Option<String>,
    pub zip_code: Option<String>,
    pub status: LeadStatus,
    pub revenue_estimate: Option<Decimal>,
    pub priority: i32,
    pub raw_payload: Value,
}

// --- HISTÓRICO (append-only) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadStatusHistory {
    pub id: i64,
    pub lead_id: i64,
    pub old_status: LeadStatus,
    pub new_status: LeadStatus,
    pub changed_by: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadActivity {
    pub id: i64,
    pub lead_id: i64,
    #[schema(example = "status_changed")]
    pub activity_type: String,
    pub description: String,
    pub actor: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Quem pediu a transição e por quê.
#[derive(Debug, Clone)]
pub struct StatusChangeMeta {
    pub actor: String,
    pub reason: Option<String>,
}

// --- PAYLOAD DE ENTRADA ---

// Fornecedores externos mandam nomes de campo variados; aceitamos os aliases conhecidos.
// Cada grafia é um campo próprio em `VendorFields`, então um payload que traga
// duas delas (ex: `phone` e `phoneNumber`) continua válido.
#[derive(Debug, Clone, Default, Validate, ToSchema)]
pub struct LeadSubmission {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,

    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,

    #[schema(example = "(310) 555-0199")]
    pub phone: Option<String>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[schema(example = "90210")]
    pub zip_code: Option<String>,

    #[schema(example = "Solar")]
    pub product_type: Option<String>,

    pub revenue_estimate: Option<Decimal>,

    #[validate(range(min = 0, max = 100, message = "invalid_priority"))]
    pub priority: Option<i32>,

    // Destino explícito (roteamento por prioridade)
    pub destination_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VendorFields {
    first_name: Option<String>,
    #[serde(rename = "firstName")]
    first_name_camel: Option<String>,
    last_name: Option<String>,
    #[serde(rename = "lastName")]
    last_name_camel: Option<String>,
    full_name: Option<String>,
    #[serde(rename = "fullName")]
    full_name_camel: Option<String>,
    name: Option<String>,

    email: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    phone: Option<String>,
    #[serde(rename = "phoneNumber", deserialize_with = "string_or_number")]
    phone_number_camel: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    phone_number: Option<String>,

    address: Option<String>,
    city: Option<String>,
    state: Option<String>,

    #[serde(deserialize_with = "string_or_number")]
    zip_code: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    zip: Option<String>,
    #[serde(rename = "zipCode", deserialize_with = "string_or_number")]
    zip_code_camel: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    postal_code: Option<String>,

    product_type: Option<String>,
    product: Option<String>,
    #[serde(rename = "productType")]
    product_type_camel: Option<String>,
    service_type: Option<String>,
    #[serde(rename = "serviceType")]
    service_type_camel: Option<String>,

    revenue_estimate: Option<Decimal>,
    #[serde(rename = "revenueEstimate")]
    revenue_estimate_camel: Option<Decimal>,

    priority: Option<i32>,

    destination_id: Option<String>,
    #[serde(rename = "destinationId")]
    destination_id_camel: Option<String>,
    workspace_id: Option<String>,
    #[serde(rename = "workspaceId")]
    workspace_id_camel: Option<String>,
}

// Primeira grafia preenchida vence, na ordem dada
fn first_filled<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|v| !v.trim().is_empty())
}

impl From<VendorFields> for LeadSubmission {
    fn from(v: VendorFields) -> Self {
        Self {
            first_name: first_filled([v.first_name, v.first_name_camel]),
            last_name: first_filled([v.last_name, v.last_name_camel]),
            full_name: first_filled([v.full_name, v.full_name_camel, v.name]),
            email: v.email,
            phone: first_filled([v.phone, v.phone_number_camel, v.phone_number]),
            address: v.address,
            city: v.city,
            state: v.state,
            zip_code: first_filled([v.zip_code, v.zip, v.zip_code_camel, v.postal_code]),
            product_type: first_filled([
                v.product_type,
                v.product,
                v.product_type_camel,
                v.service_type,
                v.service_type_camel,
            ]),
            revenue_estimate: v.revenue_estimate.or(v.revenue_estimate_camel),
            priority: v.priority,
            destination_id: first_filled([
                v.destination_id,
                v.destination_id_camel,
                v.workspace_id,
                v.workspace_id_camel,
            ]),
        }
    }
}

impl<'de> Deserialize<'de> for LeadSubmission {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        VendorFields::deserialize(deserializer).map(LeadSubmission::from)
    }
}

impl LeadSubmission {
    /// Primeiro/último nome, dividindo o nome completo quando só ele veio.
    pub fn names(&self) -> (Option<String>, Option<String>) {
        let first = self.first_name.clone().filter(|v| !v.trim().is_empty());
        let last = self.last_name.clone().filter(|v| !v.trim().is_empty());
        if first.is_some() || last.is_some() {
            return (first, last);
        }

        match self.full_name.as_deref().map(str::trim) {
            Some(full) if !full.is_empty() => match full.split_once(char::is_whitespace) {
                Some((first, rest)) => (Some(first.to_string()), Some(rest.trim().to_string())),
                None => (Some(full.to_string()), None),
            },
            _ => (None, None),
        }
    }
}

// --- RESPOSTA ---

// "Gravado mas não distribuído" é um resultado de primeira classe: sempre há ids.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitLeadResponse {
    pub contact_id: i64,
    pub lead_id: i64,
    pub is_new_contact: bool,
    pub routing_method: RoutingMethod,
    pub matched_destinations: Vec<String>,
    pub deliveries: Vec<DeliveryOutcome>,
}

// Telefones e CEPs chegam às vezes como número JSON.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "esperado texto ou número, recebido {}",
            other
        ))),
    }
}
