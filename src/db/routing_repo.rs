// src/db/routing_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::routing::{CompiledRule, RoutingRuleRow, Workspace},
};

const RULE_COLUMNS: &str = r#"
    r.id, r.workspace_id, r.source_endpoint_id, r.product_types, r.zip_codes,
    r.priority, r.is_active, r.notes, r.created_at, w.callback_url
"#;

/// Conjunto de regras a avaliar.
#[derive(Debug, Clone, Copy)]
pub enum RuleScope<'a> {
    /// Regras restritas a um endpoint de origem (encaminhamento de leads).
    SourceEndpoint(&'a str),
    /// Todas as regras ativas (agendamentos sem destino pré-selecionado).
    AllActive,
}

#[derive(Clone)]
pub struct RoutingRepository {
    pool: PgPool,
}

impl RoutingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Carrega e compila as regras ativas (de destinos ativos) do escopo,
    /// já na ordem de avaliação: prioridade, depois ordem de criação.
    pub async fn load_rules(&self, scope: RuleScope<'_>) -> Result<Vec<CompiledRule>, AppError> {
        let rows = match scope {
            RuleScope::SourceEndpoint(endpoint_id) => {
                let sql = format!(
                    r#"
                    SELECT {RULE_COLUMNS}
                    FROM routing_rules r
                    INNER JOIN workspaces w ON w.id = r.workspace_id
                    WHERE r.is_active AND w.is_active AND r.source_endpoint_id = $1
                    ORDER BY r.priority ASC, r.created_at ASC, r.id ASC
                    "#
                );
                sqlx::query_as::<_, RoutingRuleRow>(&sql)
                    .bind(endpoint_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            RuleScope::AllActive => {
                let sql = format!(
                    r#"
                    SELECT {RULE_COLUMNS}
                    FROM routing_rules r
                    INNER JOIN workspaces w ON w.id = r.workspace_id
                    WHERE r.is_active AND w.is_active
                    ORDER BY r.priority ASC, r.created_at ASC, r.id ASC
                    "#
                );
                sqlx::query_as::<_, RoutingRuleRow>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(CompiledRule::from).collect())
    }

    pub async fn find_active_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, AppError> {
        let workspace = sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, name, callback_url, is_active, forward_success_count,
                   forward_failure_count, last_forwarded_at, created_at
            FROM workspaces
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(workspace)
    }

    /// Contadores de entrega do destino (incremento atômico).
    pub async fn record_forward_result<'e, E>(
        &self,
        executor: E,
        workspace_id: &str,
        success: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE workspaces
            SET forward_success_count = forward_success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                forward_failure_count = forward_failure_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_forwarded_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(workspace_id)
        .bind(success)
        .execute(executor)
        .await?;

        Ok(())
    }
}
