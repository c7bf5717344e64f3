//! Varredura periódica de exclusões vencidas (gatilho de fallback).
//!
//! Cobre mensagens da fila perdidas num restart e jobs que falharam.
//! Roda a mesma unidade idempotente que o consumidor da fila.

use std::time::Duration;

use futures::TryStreamExt;
use tokio_util::sync::CancellationToken;

use crate::{
    common::error::AppError,
    models::deletion::{DeletionOutcome, PendingDeletion},
    services::lifecycle_service::LifecycleService,
};

/// Contagem de uma execução da varredura.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Uma passada: busca as exclusões vencidas e executa cada uma.
pub async fn run_once(service: &LifecycleService) -> Result<SweepReport, AppError> {
    // Materializa antes de excluir: o cursor não fica aberto durante as exclusões
    let due: Vec<PendingDeletion> = service.due_deletions().try_collect().await?;

    let mut report = SweepReport::default();
    for item in due {
        match service.execute_scheduled_deletion(item.job_id, &item.endpoint_id).await {
            Ok(DeletionOutcome::Completed) => report.processed += 1,
            Ok(outcome) => {
                tracing::debug!(job_id = %item.job_id, endpoint_id = %item.endpoint_id, ?outcome, "Varredura: item ignorado");
                report.skipped += 1;
            }
            // Já registrado e marcado como failed pela unidade
            Err(_) => report.failed += 1,
        }
    }

    Ok(report)
}

/// Laço da varredura. Roda até `cancel` disparar.
pub async fn run(service: LifecycleService, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Varredura de exclusões iniciada");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Varredura de exclusões parando");
                break;
            }
            _ = interval.tick() => {
                match run_once(&service).await {
                    Ok(report) if report == SweepReport::default() => {
                        tracing::debug!("Varredura: nada vencido");
                    }
                    Ok(report) => {
                        tracing::info!(
                            processed = report.processed,
                            failed = report.failed,
                            skipped = report.skipped,
                            "Varredura de exclusões concluída"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Varredura de exclusões falhou");
                    }
                }
            }
        }
    }
}
