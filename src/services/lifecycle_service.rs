// src/services/lifecycle_service.rs

use chrono::Duration;
use futures::stream::BoxStream;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    background::deletion_queue::DeletionQueue,
    common::{clock::SharedClock, error::AppError},
    db::{DeletionRepository, EndpointRepository},
    models::{
        deletion::{DeletionOutcome, LifecycleEvent, LifecycleEventType, PendingDeletion, RestoreResult, SoftDeleteResult},
        endpoint::EndpointState,
    },
    services::lead_service::SYSTEM_ACTOR,
};

/// Parâmetros do ciclo de vida (vêm de `Settings`).
#[derive(Debug, Clone, Copy)]
pub struct LifecyclePolicy {
    pub grace_period: Duration,
    pub max_attempts: i32,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self { grace_period: Duration::hours(24), max_attempts: 3 }
    }
}

#[derive(Clone)]
pub struct LifecycleService {
    pool: PgPool,
    clock: SharedClock,
    endpoint_repo: EndpointRepository,
    deletion_repo: DeletionRepository,
    queue: DeletionQueue,
    policy: LifecyclePolicy,
}

impl LifecycleService {
    pub fn new(
        pool: PgPool,
        clock: SharedClock,
        endpoint_repo: EndpointRepository,
        deletion_repo: DeletionRepository,
        queue: DeletionQueue,
        policy: LifecyclePolicy,
    ) -> Self {
        Self { pool, clock, endpoint_repo, deletion_repo, queue, policy }
    }

    pub fn max_attempts(&self) -> i32 {
        self.policy.max_attempts
    }

    // =========================================================================
    //  1. TRANSIÇÕES DO OPERADOR
    //  Ordem de travas: endpoint (FOR UPDATE) e só depois o job.
    // =========================================================================

    /// `Active -> SoftDeleted`. Com `force`, exclui na hora (de qualquer estado).
    pub async fn soft_delete_endpoint(
        &self,
        endpoint_id: &str,
        reason: Option<&str>,
        actor: &str,
        force: bool,
    ) -> Result<SoftDeleteResult, AppError> {
        if force {
            return self.force_delete_endpoint(endpoint_id, reason, actor).await;
        }

        let mut tx = self.pool.begin().await?;

        let endpoint = self
            .endpoint_repo
            .lock_for_update(&mut *tx, endpoint_id)
            .await?
            .ok_or_else(|| AppError::not_found("Endpoint", endpoint_id))?;

        if let state @ EndpointState::SoftDeleted { .. } = endpoint.state() {
            return Err(AppError::Conflict {
                message: format!("O endpoint '{}' já está marcado para exclusão.", endpoint_id),
                current_state: serde_json::to_value(state).unwrap_or(Value::Null),
            });
        }

        let now = self.clock.now();
        let scheduled_at = now + self.policy.grace_period;
        let job_id = Uuid::new_v4();

        self.endpoint_repo
            .mark_soft_deleted(&mut *tx, endpoint_id, now, scheduled_at, reason, actor, job_id)
            .await?;
        self.deletion_repo
            .create_job(&mut *tx, job_id, endpoint_id, scheduled_at, actor, now)
            .await?;
        self.deletion_repo
            .insert_event(
                &mut *tx,
                endpoint_id,
                LifecycleEventType::SoftDeleted,
                actor,
                reason,
                Some(job_id),
                &json!({ "scheduled_at": scheduled_at }),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(endpoint_id, %job_id, %scheduled_at, actor, "Endpoint marcado para exclusão");

        // Só depois do commit: a mensagem nunca aponta para um job inexistente
        let delay = (scheduled_at - now).to_std().unwrap_or_default();
        self.queue.schedule(job_id, endpoint_id, delay);

        Ok(SoftDeleteResult {
            endpoint_id: endpoint_id.to_string(),
            job_id: Some(job_id),
            scheduled_at: Some(scheduled_at),
            permanently_deleted: false,
        })
    }

    /// Exclusão imediata, sem janela. Cancela o job aberto, se houver.
    /// Leads e contatos do endpoint permanecem.
    pub async fn force_delete_endpoint(
        &self,
        endpoint_id: &str,
        reason: Option<&str>,
        actor: &str,
    ) -> Result<SoftDeleteResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let endpoint = self
            .endpoint_repo
            .lock_for_update(&mut *tx, endpoint_id)
            .await?
            .ok_or_else(|| AppError::not_found("Endpoint", endpoint_id))?;

        let now = self.clock.now();
        let mut cancelled_job = None;
        if let Some(job_id) = endpoint.deletion_job_id {
            if self
                .deletion_repo
                .cancel_job(&mut *tx, job_id, Some("Substituído por exclusão forçada"), now)
                .await?
            {
                cancelled_job = Some(job_id);
            }
        }

        self.deletion_repo
            .insert_event(
                &mut *tx,
                endpoint_id,
                LifecycleEventType::ForceDeleted,
                actor,
                reason,
                cancelled_job,
                &json!({
                    "was_soft_deleted": endpoint.deleted_at.is_some(),
                    "total_leads": endpoint.total_leads,
                }),
            )
            .await?;
        self.endpoint_repo.delete(&mut *tx, endpoint_id).await?;

        tx.commit().await?;

        tracing::warn!(endpoint_id, actor, ?cancelled_job, "Endpoint excluído definitivamente (forçado)");

        Ok(SoftDeleteResult {
            endpoint_id: endpoint_id.to_string(),
            job_id: None,
            scheduled_at: None,
            permanently_deleted: true,
        })
    }

    /// `SoftDeleted -> Active`, só enquanto `now < scheduled_at`.
    pub async fn restore_endpoint(&self, endpoint_id: &str, actor: &str) -> Result<RestoreResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let endpoint = self
            .endpoint_repo
            .lock_for_update(&mut *tx, endpoint_id)
            .await?
            .ok_or_else(|| AppError::not_found("Endpoint", endpoint_id))?;

        let (scheduled_at, job_id) = match endpoint.state() {
            EndpointState::SoftDeleted { scheduled_at, job_id } => (scheduled_at, job_id),
            EndpointState::Active => return Err(AppError::not_found("Endpoint excluído", endpoint_id)),
        };

        let now = self.clock.now();
        if now >= scheduled_at {
            return Err(AppError::WindowExpired { scheduled_at });
        }

        self.endpoint_repo.clear_deletion(&mut *tx, endpoint_id, now).await?;
        if let Some(job_id) = job_id {
            self.deletion_repo
                .cancel_job(&mut *tx, job_id, Some("Endpoint restaurado"), now)
                .await?;
        }
        self.deletion_repo
            .insert_event(
                &mut *tx,
                endpoint_id,
                LifecycleEventType::Restored,
                actor,
                None,
                job_id,
                &json!({ "scheduled_at": scheduled_at }),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(endpoint_id, actor, "Endpoint restaurado");

        Ok(RestoreResult { endpoint_id: endpoint_id.to_string(), restored_at: now })
    }

    // =========================================================================
    //  2. CONSULTAS
    // =========================================================================

    /// Todas as exclusões abertas, sob demanda (reiniciável).
    pub fn list_pending_deletions(&self) -> BoxStream<'_, Result<PendingDeletion, AppError>> {
        self.deletion_repo.stream_pending(None, self.policy.max_attempts)
    }

    /// Só as que já venceram (usado pela varredura).
    pub fn due_deletions(&self) -> BoxStream<'_, Result<PendingDeletion, AppError>> {
        self.deletion_repo.stream_pending(Some(self.clock.now()), self.policy.max_attempts)
    }

    pub async fn lifecycle_events(&self, endpoint_id: &str) -> Result<Vec<LifecycleEvent>, AppError> {
        self.deletion_repo.list_events(endpoint_id).await
    }

    // =========================================================================
    //  3. EXECUÇÃO DA EXCLUSÃO DEFINITIVA (fila e varredura)
    // =========================================================================

    /// Unidade idempotente usada pelos dois gatilhos.
    ///
    /// "Job não pendente" (concluído, cancelado por restore, esgotado) é um
    /// no-op benigno. Qualquer erro desfaz a unidade inteira e marca o job
    /// como `failed`, contando a tentativa.
    pub async fn execute_scheduled_deletion(
        &self,
        job_id: Uuid,
        endpoint_id: &str,
    ) -> Result<DeletionOutcome, AppError> {
        match self.run_deletion_unit(job_id, endpoint_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(%job_id, endpoint_id, error = %e, "Falha na exclusão definitiva");
                if let Err(mark_err) = self.deletion_repo.mark_failed(job_id, &e.to_string()).await {
                    tracing::error!(%job_id, error = %mark_err, "Falha ao marcar job como failed");
                }
                Err(e)
            }
        }
    }

    async fn run_deletion_unit(&self, job_id: Uuid, endpoint_id: &str) -> Result<DeletionOutcome, AppError> {
        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        // Mesma ordem de travas do restore: endpoint primeiro
        let endpoint = self.endpoint_repo.lock_for_update(&mut *tx, endpoint_id).await?;

        // Compare-and-set: só um gatilho vence
        let Some(job) = self
            .deletion_repo
            .claim_job(&mut *tx, job_id, self.policy.max_attempts, now)
            .await?
        else {
            tracing::debug!(%job_id, endpoint_id, "Job não está mais pendente");
            return Ok(DeletionOutcome::JobNotPending);
        };

        if now < job.scheduled_for {
            // Descarta o claim
            tx.rollback().await?;
            return Ok(DeletionOutcome::NotDue);
        }

        let endpoint = match endpoint {
            Some(e) if e.deleted_at.is_some() && e.deletion_job_id == Some(job_id) => e,
            _ => {
                self.deletion_repo
                    .cancel_job(&mut *tx, job_id, Some("Endpoint não está mais marcado para exclusão"), now)
                    .await?;
                tx.commit().await?;
                tracing::info!(%job_id, endpoint_id, "Endpoint não está mais soft-deleted, job cancelado");
                return Ok(DeletionOutcome::EndpointNotSoftDeleted);
            }
        };

        self.deletion_repo
            .insert_event(
                &mut *tx,
                endpoint_id,
                LifecycleEventType::PermanentlyDeleted,
                SYSTEM_ACTOR,
                endpoint.deletion_reason.as_deref(),
                Some(job_id),
                &json!({
                    "attempt": job.attempts,
                    "deleted_by": endpoint.deleted_by,
                    "deleted_at": endpoint.deleted_at,
                    "total_leads": endpoint.total_leads,
                }),
            )
            .await?;
        self.endpoint_repo.delete(&mut *tx, endpoint_id).await?;
        self.deletion_repo.complete_job(&mut *tx, job_id, now).await?;

        tx.commit().await?;

        tracing::info!(%job_id, endpoint_id, attempt = job.attempts, "Endpoint excluído definitivamente");

        Ok(DeletionOutcome::Completed)
    }
}
