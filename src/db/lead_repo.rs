// src/db/lead_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::lead::{Lead, LeadActivity, LeadStatus, LeadStatusHistory, NewLead},
};

const LEAD_COLUMNS: &str = r#"
    id, contact_id, endpoint_id, product_type, zip_code, status,
    revenue_estimate, assigned_workspace_id, priority, raw_payload,
    converted_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  LEADS
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        contact_id: i64,
        lead: &NewLead,
        created_at: DateTime<Utc>,
    ) -> Result<Lead, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO leads (
                contact_id, endpoint_id, product_type, zip_code, status,
                revenue_estimate, priority, raw_payload, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING {LEAD_COLUMNS}
            "#
        );

        let lead = sqlx::query_as::<_, Lead>(&sql)
            .bind(contact_id)
            .bind(&lead.endpoint_id)
            .bind(lead.product_type.as_deref())
            .bind(lead.zip_code.as_deref())
            .bind(lead.status)
            .bind(lead.revenue_estimate)
            .bind(lead.priority)
            .bind(&lead.raw_payload)
            .bind(created_at)
            .fetch_one(executor)
            .await?;

        Ok(lead)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, lead_id: i64) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        let lead = sqlx::query_as::<_, Lead>(&sql)
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;

        Ok(lead)
    }

    /// Trava a linha do lead até o fim da transação (transições concorrentes
    /// no mesmo lead ficam em fila, cada uma vendo o status deixado pela anterior).
    pub async fn lock_for_update<'e, E>(&self, executor: E, lead_id: i64) -> Result<Option<Lead>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1 FOR UPDATE");
        let lead = sqlx::query_as::<_, Lead>(&sql)
            .bind(lead_id)
            .fetch_optional(executor)
            .await?;

        Ok(lead)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        lead_id: i64,
        status: LeadStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE leads
            SET status = $2,
                converted_at = CASE WHEN $2 = 'converted'::lead_status THEN $3 ELSE converted_at END,
                updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(lead_id)
        .bind(status)
        .bind(at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Registra o primeiro destino que aceitou o lead.
    pub async fn assign_workspace<'e, E>(
        &self,
        executor: E,
        lead_id: i64,
        workspace_id: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE leads
            SET assigned_workspace_id = $2, updated_at = NOW()
            WHERE id = $1 AND assigned_workspace_id IS NULL
            "#,
        )
        .bind(lead_id)
        .bind(workspace_id)
        .execute(executor)
        .await?;

        Ok(())
    }

    // =========================================================================
    //  HISTÓRICO E ATIVIDADES (append-only)
    // =========================================================================

    pub async fn append_history<'e, E>(
        &self,
        executor: E,
        lead_id: i64,
        old_status: LeadStatus,
        new_status: LeadStatus,
        changed_by: &str,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<LeadStatusHistory, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, LeadStatusHistory>(
            r#"
            INSERT INTO lead_status_history (lead_id, old_status, new_status, changed_by, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, lead_id, old_status, new_status, changed_by, reason, created_at
            "#,
        )
        .bind(lead_id)
        .bind(old_status)
        .bind(new_status)
        .bind(changed_by)
        .bind(reason)
        .bind(at)
        .fetch_one(executor)
        .await?;

        Ok(entry)
    }

    pub async fn list_history(&self, lead_id: i64) -> Result<Vec<LeadStatusHistory>, AppError> {
        let history = sqlx::query_as::<_, LeadStatusHistory>(
            r#"
            SELECT id, lead_id, old_status, new_status, changed_by, reason, created_at
            FROM lead_status_history
            WHERE lead_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(history)
    }

    pub async fn append_activity<'e, E>(
        &self,
        executor: E,
        lead_id: i64,
        activity_type: &str,
        description: &str,
        actor: &str,
        metadata: &Value,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO lead_activities (lead_id, activity_type, description, actor, metadata)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(lead_id)
        .bind(activity_type)
        .bind(description)
        .bind(actor)
        .bind(metadata)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn list_activities(&self, lead_id: i64) -> Result<Vec<LeadActivity>, AppError> {
        let activities = sqlx::query_as::<_, LeadActivity>(
            r#"
            SELECT id, lead_id, activity_type, description, actor, metadata, created_at
            FROM lead_activities
            WHERE lead_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(activities)
    }
}
