// src/db/contact_repo.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::contact::{Contact, ContactAttributes, UpsertedContact},
};

const CONTACT_COLUMNS: &str = r#"
    id, endpoint_id, normalized_phone, phone_raw,
    first_name, last_name, email, address, city, state, zip_code,
    lifetime_value, total_leads, conversion_count, qualification_status,
    first_seen_at, last_seen_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct ContactRepository {
    pool: PgPool,
}

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Busca-ou-cria pelo par (endpoint, telefone normalizado) numa única instrução.
    ///
    /// O `ON CONFLICT` serializa criações concorrentes na constraint única:
    /// quem perde a corrida recebe a linha existente já atualizada. Só os
    /// atributos presentes sobrescrevem; telefone normalizado e endpoint nunca mudam.
    pub async fn upsert<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        normalized_phone: &str,
        attrs: &ContactAttributes,
        seen_at: DateTime<Utc>,
    ) -> Result<UpsertedContact, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO contacts (
                endpoint_id, normalized_phone, phone_raw,
                first_name, last_name, email, address, city, state, zip_code,
                first_seen_at, last_seen_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11, $11, $11)
            ON CONFLICT (endpoint_id, normalized_phone) DO UPDATE SET
                phone_raw    = COALESCE(EXCLUDED.phone_raw, contacts.phone_raw),
                first_name   = COALESCE(EXCLUDED.first_name, contacts.first_name),
                last_name    = COALESCE(EXCLUDED.last_name, contacts.last_name),
                email        = COALESCE(EXCLUDED.email, contacts.email),
                address      = COALESCE(EXCLUDED.address, contacts.address),
                city         = COALESCE(EXCLUDED.city, contacts.city),
                state        = COALESCE(EXCLUDED.state, contacts.state),
                zip_code     = COALESCE(EXCLUDED.zip_code, contacts.zip_code),
                last_seen_at = GREATEST(contacts.last_seen_at, EXCLUDED.last_seen_at),
                updated_at   = EXCLUDED.updated_at
            RETURNING {CONTACT_COLUMNS}, (xmax = 0) AS is_new
            "#
        );

        let upserted = sqlx::query_as::<_, UpsertedContact>(&sql)
            .bind(endpoint_id)
            .bind(normalized_phone)
            .bind(attrs.phone_raw.as_deref())
            .bind(attrs.first_name.as_deref())
            .bind(attrs.last_name.as_deref())
            .bind(attrs.email.as_deref())
            .bind(attrs.address.as_deref())
            .bind(attrs.city.as_deref())
            .bind(attrs.state.as_deref())
            .bind(attrs.zip_code.as_deref())
            .bind(seen_at)
            .fetch_one(executor)
            .await?;

        Ok(upserted)
    }

    pub async fn find_by_id(&self, contact_id: i64) -> Result<Option<Contact>, AppError> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");
        let contact = sqlx::query_as::<_, Contact>(&sql)
            .bind(contact_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(contact)
    }

    pub async fn count_by_key<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        normalized_phone: &str,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM contacts WHERE endpoint_id = $1 AND normalized_phone = $2",
        )
        .bind(endpoint_id)
        .bind(normalized_phone)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Mais um lead para este contato.
    pub async fn increment_total_leads<'e, E>(
        &self,
        executor: E,
        contact_id: i64,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE contacts SET total_leads = total_leads + 1 WHERE id = $1")
            .bind(contact_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Conversão: contador + valor acumulado + qualificação.
    pub async fn record_conversion<'e, E>(
        &self,
        executor: E,
        contact_id: i64,
        revenue: Option<Decimal>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE contacts
            SET conversion_count = conversion_count + 1,
                lifetime_value = lifetime_value + COALESCE($2, 0),
                qualification_status = 'qualified',
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(revenue)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn mark_qualified<'e, E>(&self, executor: E, contact_id: i64) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE contacts SET qualification_status = 'qualified', updated_at = NOW() WHERE id = $1",
        )
        .bind(contact_id)
        .execute(executor)
        .await?;

        Ok(())
    }
}
