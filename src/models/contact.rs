// src/models/contact.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

// --- CONTATO (identidade deduplicada por endpoint + telefone) ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[schema(example = 1024)]
    pub id: i64,
    #[schema(example = "ep_solar_ca")]
    pub endpoint_id: String,

    // Chave de deduplicação, nunca sobrescrita
    #[schema(example = "+13105550199")]
    pub normalized_phone: String,
    pub phone_raw: Option<String>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,

    // Agregados
    #[schema(example = "1500.00")]
    pub lifetime_value: Decimal,
    pub total_leads: i32,
    pub conversion_count: i32,
    #[schema(example = "unqualified")]
    pub qualification_status: String,

    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Linha retornada pelo upsert: o contato + se ele acabou de ser inserido.
#[derive(Debug, Clone, FromRow)]
pub struct UpsertedContact {
    #[sqlx(flatten)]
    pub contact: Contact,
    pub is_new: bool,
}

/// Atributos parciais vindos de uma submissão. `None` = "não informado",
/// ou seja, mantém o valor existente.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactAttributes {
    pub phone_raw: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}
