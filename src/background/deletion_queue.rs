//! Fila atrasada de exclusões definitivas (gatilho por evento).
//!
//! O soft delete publica uma mensagem com atraso igual ao tempo restante da
//! janela. O consumidor guarda as mensagens num [`DelayQueue`] e, no vencimento,
//! roda a mesma unidade de exclusão que a varredura periódica. A checagem de
//! "job ainda pendente" acontece na execução, então um restore feito depois
//! do agendamento anula a mensagem.
//!
//! A fila vive em memória: mensagens perdidas num restart ficam a cargo da
//! varredura (`deletion_sweep`).

use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, time::DelayQueue};
use uuid::Uuid;

use crate::{models::deletion::DeletionOutcome, services::lifecycle_service::LifecycleService};

// Teto de atraso aceito pelo DelayQueue com folga; além disso a varredura cobre
const MAX_DELAY: Duration = Duration::from_secs(30 * 24 * 3600);

/// "Execute a exclusão do job X no endpoint Y."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionMessage {
    pub job_id: Uuid,
    pub endpoint_id: String,
    /// Entregas já feitas desta mensagem (0 na primeira).
    pub delivery: u32,
}

#[derive(Debug)]
struct Scheduled {
    message: DeletionMessage,
    delay: Duration,
}

/// Lado produtor da fila. Barato de clonar.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::UnboundedSender<Scheduled>,
}

/// Lado consumidor, entregue a [`run`].
#[derive(Debug)]
pub struct DeletionQueueReceiver {
    rx: mpsc::UnboundedReceiver<Scheduled>,
}

impl DeletionQueue {
    pub fn channel() -> (Self, DeletionQueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DeletionQueueReceiver { rx })
    }

    /// Agenda a execução. `false` se o consumidor já parou.
    pub fn schedule(&self, job_id: Uuid, endpoint_id: &str, delay: Duration) -> bool {
        let message = DeletionMessage { job_id, endpoint_id: endpoint_id.to_string(), delivery: 0 };
        match self.tx.send(Scheduled { message, delay }) {
            Ok(()) => {
                tracing::debug!(%job_id, endpoint_id, delay_secs = delay.as_secs(), "Exclusão enfileirada");
                true
            }
            Err(_) => {
                tracing::warn!(%job_id, endpoint_id, "Consumidor da fila de exclusão parado, varredura assume");
                false
            }
        }
    }
}

/// Atraso da re-entrega `n` (0-based): `base * 2^n`.
pub fn retry_delay(base: Duration, delivery: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(delivery))
}

/// Laço do consumidor. Roda até `cancel` disparar.
pub async fn run(
    service: LifecycleService,
    mut receiver: DeletionQueueReceiver,
    retry_base: Duration,
    cancel: CancellationToken,
) {
    let max_deliveries = u32::try_from(service.max_attempts()).unwrap_or(1).max(1);
    let mut pending: DelayQueue<DeletionMessage> = DelayQueue::new();
    let mut producers_alive = true;

    tracing::info!(max_deliveries, retry_base_secs = retry_base.as_secs(), "Fila de exclusão iniciada");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(pending = pending.len(), "Fila de exclusão parando");
                break;
            }
            received = receiver.rx.recv(), if producers_alive => {
                match received {
                    Some(Scheduled { message, delay }) => {
                        pending.insert(message, delay.min(MAX_DELAY));
                    }
                    None => {
                        producers_alive = false;
                        if pending.is_empty() {
                            break;
                        }
                    }
                }
            }
            Some(expired) = pending.next(), if !pending.is_empty() => {
                let message = expired.into_inner();
                if let Some(retry) = handle(&service, message, retry_base, max_deliveries).await {
                    pending.insert(retry.message, retry.delay.min(MAX_DELAY));
                }
                if !producers_alive && pending.is_empty() {
                    break;
                }
            }
        }
    }
}

async fn handle(
    service: &LifecycleService,
    message: DeletionMessage,
    retry_base: Duration,
    max_deliveries: u32,
) -> Option<Scheduled> {
    let job_id = message.job_id;
    let endpoint_id = message.endpoint_id.as_str();

    match service.execute_scheduled_deletion(job_id, endpoint_id).await {
        Ok(DeletionOutcome::Completed) => {
            tracing::info!(%job_id, endpoint_id, "Exclusão definitiva concluída (fila)");
            None
        }
        Ok(DeletionOutcome::NotDue) => {
            // Chegou cedo (relógio adiantado); tenta de novo sem gastar entrega
            tracing::debug!(%job_id, endpoint_id, "Mensagem antes do horário, reagendando");
            Some(Scheduled { message, delay: retry_base })
        }
        Ok(outcome) => {
            tracing::debug!(%job_id, endpoint_id, ?outcome, "Mensagem de exclusão descartada");
            None
        }
        Err(e) => {
            let next_delivery = message.delivery + 1;
            if next_delivery >= max_deliveries {
                tracing::error!(%job_id, endpoint_id, error = %e, "Exclusão falhou, tentativas esgotadas");
                return None;
            }
            let delay = retry_delay(retry_base, message.delivery);
            tracing::warn!(
                %job_id,
                endpoint_id,
                error = %e,
                retry_in_secs = delay.as_secs(),
                "Exclusão falhou, reagendando"
            );
            Some(Scheduled { message: DeletionMessage { delivery: next_delivery, ..message }, delay })
        }
    }
}
