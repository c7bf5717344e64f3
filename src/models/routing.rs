// src/models/routing.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Token que significa "qualquer valor" nas listas de uma regra.
pub const WILDCARD: &str = "*";

// --- ENUMS ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "routing_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    // Padrão: evita distribuir o mesmo lead duas vezes
    #[default]
    FirstMatch,
    AllMatches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "routing_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    Priority,
    Auto,
    Unrouted,
}

// --- DESTINO ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[schema(example = "ws_west")]
    pub id: String,
    pub name: String,
    pub callback_url: Option<String>,
    pub is_active: bool,
    pub forward_success_count: i64,
    pub forward_failure_count: i64,
    pub last_forwarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- REGRA (linha do banco) ---

#[derive(Debug, Clone, FromRow)]
pub struct RoutingRuleRow {
    pub id: i64,
    pub workspace_id: String,
    pub source_endpoint_id: Option<String>,
    pub product_types: Vec<String>,
    pub zip_codes: Vec<String>,
    pub priority: i32,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    // Vem do JOIN com workspaces
    pub callback_url: Option<String>,
}

// --- REGRA COMPILADA (parse feito uma vez, no carregamento) ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Any,
    /// Valores já normalizados para comparação.
    OneOf(Vec<String>),
}

impl Criterion {
    /// Produtos comparam sem diferenciar maiúsculas.
    pub fn products(values: &[String]) -> Self {
        Self::compile(values, |v| v.trim().to_lowercase())
    }

    /// CEPs comparam por igualdade exata.
    pub fn zips(values: &[String]) -> Self {
        Self::compile(values, |v| v.trim().to_string())
    }

    fn compile(values: &[String], normalize: impl Fn(&str) -> String) -> Self {
        if values.iter().any(|v| v.trim() == WILDCARD) {
            return Criterion::Any;
        }
        Criterion::OneOf(values.iter().map(|v| normalize(v)).filter(|v| !v.is_empty()).collect())
    }

    pub fn accepts(&self, normalized_value: Option<&str>) -> bool {
        match self {
            Criterion::Any => true,
            Criterion::OneOf(values) => {
                normalized_value.is_some_and(|value| values.iter().any(|v| v == value))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: i64,
    pub workspace_id: String,
    pub callback_url: Option<String>,
    pub products: Criterion,
    pub zips: Criterion,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl From<RoutingRuleRow> for CompiledRule {
    fn from(row: RoutingRuleRow) -> Self {
        Self {
            id: row.id,
            workspace_id: row.workspace_id,
            callback_url: row.callback_url,
            products: Criterion::products(&row.product_types),
            zips: Criterion::zips(&row.zip_codes),
            priority: row.priority,
            created_at: row.created_at,
        }
    }
}

/// O que está sendo roteado.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub product_type: Option<String>,
    pub zip_code: Option<String>,
}

/// Um destino escolhido (por regra ou por prioridade).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTarget {
    pub workspace_id: String,
    pub callback_url: Option<String>,
    pub rule_id: Option<i64>,
    pub matched_product: Option<String>,
    pub matched_zip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub method: RoutingMethod,
    pub targets: Vec<RouteTarget>,
}

impl RoutingDecision {
    pub fn unrouted() -> Self {
        Self { method: RoutingMethod::Unrouted, targets: Vec::new() }
    }
}
