// src/db/forwarding_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::forwarding::{ForwardingLogEntry, NewForwardingLog},
};

const LOG_COLUMNS: &str = r#"
    id, lead_id, contact_id, appointment_id, source_endpoint_id, workspace_id, rule_id,
    destination_url, success, status_code, response_body, error_message,
    matched_product, matched_zip, payload_snapshot, duration_ms, created_at
"#;

#[derive(Clone)]
pub struct ForwardingRepository {
    pool: PgPool,
}

impl ForwardingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Grava uma tentativa. Nunca há UPDATE nesta tabela.
    pub async fn insert_log<'e, E>(
        &self,
        executor: E,
        entry: &NewForwardingLog,
    ) -> Result<ForwardingLogEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO forwarding_logs (
                lead_id, contact_id, appointment_id, source_endpoint_id, workspace_id, rule_id,
                destination_url, success, status_code, response_body, error_message,
                matched_product, matched_zip, payload_snapshot, duration_ms
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {LOG_COLUMNS}
            "#
        );

        let log = sqlx::query_as::<_, ForwardingLogEntry>(&sql)
            .bind(entry.lead_id)
            .bind(entry.contact_id)
            .bind(entry.appointment_id)
            .bind(entry.source_endpoint_id.as_deref())
            .bind(&entry.workspace_id)
            .bind(entry.rule_id)
            .bind(entry.destination_url.as_deref())
            .bind(entry.success)
            .bind(entry.status_code)
            .bind(entry.response_body.as_deref())
            .bind(entry.error_message.as_deref())
            .bind(entry.matched_product.as_deref())
            .bind(entry.matched_zip.as_deref())
            .bind(&entry.payload_snapshot)
            .bind(entry.duration_ms)
            .fetch_one(executor)
            .await?;

        Ok(log)
    }

    pub async fn list_for_lead(&self, lead_id: i64) -> Result<Vec<ForwardingLogEntry>, AppError> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM forwarding_logs WHERE lead_id = $1 ORDER BY id ASC");
        let logs = sqlx::query_as::<_, ForwardingLogEntry>(&sql)
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }
}
