// src/db/endpoint_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::endpoint::Endpoint};

const ENDPOINT_COLUMNS: &str = r#"
    id, name, category, is_active, routing_mode,
    total_leads, last_lead_at, total_forwarded, total_forward_failures,
    deleted_at, scheduled_permanent_deletion_at, deletion_reason, deleted_by, deletion_job_id,
    created_at, updated_at
"#;

/// Incrementos do rollup diário de um endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyStatsDelta {
    pub leads_received: i32,
    pub new_contacts: i32,
    pub forwards_succeeded: i32,
    pub forwards_failed: i32,
}

#[derive(Clone)]
pub struct EndpointRepository {
    pool: PgPool,
}

impl EndpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, endpoint_id: &str) -> Result<Option<Endpoint>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = $1");
        let endpoint = sqlx::query_as::<_, Endpoint>(&sql)
            .bind(endpoint_id)
            .fetch_optional(executor)
            .await?;

        Ok(endpoint)
    }

    /// `SELECT ... FOR UPDATE`: todas as transições de ciclo de vida travam
    /// primeiro o endpoint, depois o job (ordem fixa, sem deadlock).
    pub async fn lock_for_update<'e, E>(&self, executor: E, endpoint_id: &str) -> Result<Option<Endpoint>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints WHERE id = $1 FOR UPDATE");
        let endpoint = sqlx::query_as::<_, Endpoint>(&sql)
            .bind(endpoint_id)
            .fetch_optional(executor)
            .await?;

        Ok(endpoint)
    }

    // =========================================================================
    //  ESTATÍSTICAS (incrementos atômicos, pós-commit)
    // =========================================================================

    pub async fn record_lead_received(&self, endpoint_id: &str, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE endpoints
            SET total_leads = total_leads + 1,
                last_lead_at = GREATEST(COALESCE(last_lead_at, $2), $2)
            WHERE id = $1
            "#,
        )
        .bind(endpoint_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn record_forward_result<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        success: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE endpoints
            SET total_forwarded = total_forwarded + CASE WHEN $2 THEN 1 ELSE 0 END,
                total_forward_failures = total_forward_failures + CASE WHEN $2 THEN 0 ELSE 1 END
            WHERE id = $1
            "#,
        )
        .bind(endpoint_id)
        .bind(success)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn bump_daily_stats(
        &self,
        endpoint_id: &str,
        day: NaiveDate,
        delta: DailyStatsDelta,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO endpoint_daily_stats (
                endpoint_id, stat_date, leads_received, new_contacts, forwards_succeeded, forwards_failed
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (endpoint_id, stat_date) DO UPDATE SET
                leads_received = endpoint_daily_stats.leads_received + EXCLUDED.leads_received,
                new_contacts = endpoint_daily_stats.new_contacts + EXCLUDED.new_contacts,
                forwards_succeeded = endpoint_daily_stats.forwards_succeeded + EXCLUDED.forwards_succeeded,
                forwards_failed = endpoint_daily_stats.forwards_failed + EXCLUDED.forwards_failed
            "#,
        )
        .bind(endpoint_id)
        .bind(day)
        .bind(delta.leads_received)
        .bind(delta.new_contacts)
        .bind(delta.forwards_succeeded)
        .bind(delta.forwards_failed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    //  CICLO DE VIDA
    // =========================================================================

    pub async fn mark_soft_deleted<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        deleted_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
        reason: Option<&str>,
        deleted_by: &str,
        job_id: Uuid,
    ) -> Result<Endpoint, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE endpoints
            SET is_active = FALSE,
                deleted_at = $2,
                scheduled_permanent_deletion_at = $3,
                deletion_reason = $4,
                deleted_by = $5,
                deletion_job_id = $6,
                updated_at = $2
            WHERE id = $1
            RETURNING {ENDPOINT_COLUMNS}
            "#
        );

        let endpoint = sqlx::query_as::<_, Endpoint>(&sql)
            .bind(endpoint_id)
            .bind(deleted_at)
            .bind(scheduled_at)
            .bind(reason)
            .bind(deleted_by)
            .bind(job_id)
            .fetch_one(executor)
            .await?;

        Ok(endpoint)
    }

    /// Restore: limpa os campos de exclusão e reativa.
    pub async fn clear_deletion<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        restored_at: DateTime<Utc>,
    ) -> Result<Endpoint, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE endpoints
            SET is_active = TRUE,
                deleted_at = NULL,
                scheduled_permanent_deletion_at = NULL,
                deletion_reason = NULL,
                deleted_by = NULL,
                deletion_job_id = NULL,
                updated_at = $2
            WHERE id = $1
            RETURNING {ENDPOINT_COLUMNS}
            "#
        );

        let endpoint = sqlx::query_as::<_, Endpoint>(&sql)
            .bind(endpoint_id)
            .bind(restored_at)
            .fetch_one(executor)
            .await?;

        Ok(endpoint)
    }

    /// Remove apenas a configuração do endpoint. Contatos e leads permanecem.
    pub async fn delete<'e, E>(&self, executor: E, endpoint_id: &str) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM endpoints WHERE id = $1")
            .bind(endpoint_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
