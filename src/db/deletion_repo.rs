// src/db/deletion_repo.rs

use chrono::{DateTime, Utc};
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::deletion::{DeletionJob, LifecycleEvent, LifecycleEventType, PendingDeletion},
};

const JOB_COLUMNS: &str = r#"
    id, endpoint_id, scheduled_for, status, attempts, last_error, created_by,
    created_at, started_at, completed_at, updated_at
"#;

#[derive(Clone)]
pub struct DeletionRepository {
    pool: PgPool,
}

impl DeletionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  JOBS
    // =========================================================================

    pub async fn create_job<'e, E>(
        &self,
        executor: E,
        job_id: Uuid,
        endpoint_id: &str,
        scheduled_for: DateTime<Utc>,
        created_by: &str,
        created_at: DateTime<Utc>,
    ) -> Result<DeletionJob, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO deletion_jobs (id, endpoint_id, scheduled_for, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $5)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let job = sqlx::query_as::<_, DeletionJob>(&sql)
            .bind(job_id)
            .bind(endpoint_id)
            .bind(scheduled_for)
            .bind(created_by)
            .bind(created_at)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                // Índice parcial: já existe um job aberto para este endpoint
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::Conflict {
                            message: format!("O endpoint '{}' já possui uma exclusão agendada.", endpoint_id),
                            current_state: Value::Null,
                        };
                    }
                }
                e.into()
            })?;

        Ok(job)
    }

    pub async fn find_job<'e, E>(&self, executor: E, job_id: Uuid) -> Result<Option<DeletionJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {JOB_COLUMNS} FROM deletion_jobs WHERE id = $1");
        let job = sqlx::query_as::<_, DeletionJob>(&sql)
            .bind(job_id)
            .fetch_optional(executor)
            .await?;

        Ok(job)
    }

    /// Compare-and-set `pending|failed -> processing`. `None` = outro gatilho
    /// já concluiu, um restore cancelou, ou as tentativas se esgotaram.
    pub async fn claim_job<'e, E>(
        &self,
        executor: E,
        job_id: Uuid,
        max_attempts: i32,
        started_at: DateTime<Utc>,
    ) -> Result<Option<DeletionJob>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE deletion_jobs
            SET status = 'processing',
                attempts = attempts + 1,
                started_at = $3,
                updated_at = $3
            WHERE id = $1
              AND status IN ('pending', 'failed')
              AND attempts < $2
            RETURNING {JOB_COLUMNS}
            "#
        );

        let job = sqlx::query_as::<_, DeletionJob>(&sql)
            .bind(job_id)
            .bind(max_attempts)
            .bind(started_at)
            .fetch_optional(executor)
            .await?;

        Ok(job)
    }

    pub async fn complete_job<'e, E>(
        &self,
        executor: E,
        job_id: Uuid,
        completed_at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET status = 'completed', completed_at = $2, last_error = NULL, updated_at = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(job_id)
        .bind(completed_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Falha fora da transação da exclusão (que foi desfeita, inclusive o claim),
    /// por isso a tentativa é contada aqui.
    pub async fn mark_failed(&self, job_id: Uuid, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET status = 'failed',
                attempts = attempts + 1,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'failed')
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Cancela o job se ainda estiver aberto. Retorna se algo mudou.
    pub async fn cancel_job<'e, E>(
        &self,
        executor: E,
        job_id: Uuid,
        note: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE deletion_jobs
            SET status = 'cancelled',
                last_error = COALESCE($2, last_error),
                completed_at = $3,
                updated_at = $3
            WHERE id = $1 AND status IN ('pending', 'processing', 'failed')
            "#,
        )
        .bind(job_id)
        .bind(note)
        .bind(at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sequência preguiçosa (cursor do banco) de exclusões ainda abertas.
    /// Com `due_before`, só as que já venceram. Chamar de novo recomeça do zero.
    pub fn stream_pending(
        &self,
        due_before: Option<DateTime<Utc>>,
        max_attempts: i32,
    ) -> BoxStream<'_, Result<PendingDeletion, AppError>> {
        sqlx::query_as::<_, PendingDeletion>(
            r#"
            SELECT e.id AS endpoint_id, j.id AS job_id, j.scheduled_for AS scheduled_at, j.attempts
            FROM deletion_jobs j
            INNER JOIN endpoints e ON e.id = j.endpoint_id AND e.deletion_job_id = j.id
            WHERE e.deleted_at IS NOT NULL
              AND j.status IN ('pending', 'failed')
              AND j.attempts < $2
              AND ($1::timestamptz IS NULL OR j.scheduled_for <= $1)
            ORDER BY j.scheduled_for ASC, j.id ASC
            "#,
        )
        .bind(due_before)
        .bind(max_attempts)
        .fetch(&self.pool)
        .map_err(AppError::from)
        .boxed()
    }

    // =========================================================================
    //  EVENTOS DE AUDITORIA
    // =========================================================================

    pub async fn insert_event<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        event_type: LifecycleEventType,
        actor: &str,
        reason: Option<&str>,
        job_id: Option<Uuid>,
        details: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO endpoint_lifecycle_events (endpoint_id, event_type, actor, reason, job_id, details)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(endpoint_id)
        .bind(event_type.as_str())
        .bind(actor)
        .bind(reason)
        .bind(job_id)
        .bind(details)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list_events(&self, endpoint_id: &str) -> Result<Vec<LifecycleEvent>, AppError> {
        let events = sqlx::query_as::<_, LifecycleEvent>(
            r#"
            SELECT id, endpoint_id, event_type, actor, reason, job_id, details, created_at
            FROM endpoint_lifecycle_events
            WHERE endpoint_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(endpoint_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
