// src/db/appointment_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::appointment::{Appointment, NewAppointment},
};

const APPOINTMENT_COLUMNS: &str = r#"
    id, lead_id, contact_id, workspace_id, routing_method, scheduled_for,
    duration_minutes, timezone, notes, product_type, zip_code, raw_payload, created_at
"#;

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create<'e, E>(&self, executor: E, appointment: &NewAppointment) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO appointments (
                lead_id, contact_id, workspace_id, routing_method, scheduled_for,
                duration_minutes, timezone, notes, product_type, zip_code, raw_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment.lead_id)
            .bind(appointment.contact_id)
            .bind(appointment.workspace_id.as_deref())
            .bind(appointment.routing_method)
            .bind(appointment.scheduled_for)
            .bind(appointment.duration_minutes)
            .bind(appointment.timezone.as_deref())
            .bind(appointment.notes.as_deref())
            .bind(appointment.product_type.as_deref())
            .bind(appointment.zip_code.as_deref())
            .bind(&appointment.raw_payload)
            .fetch_one(executor)
            .await?;

        Ok(created)
    }

    pub async fn find_by_id(&self, appointment_id: i64) -> Result<Option<Appointment>, AppError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1");
        let appointment = sqlx::query_as::<_, Appointment>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(appointment)
    }
}
