// src/services/forwarding_service.rs

use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::{
    common::{
        clock::SharedClock,
        db_utils::{json_snapshot, truncate_chars},
        error::AppError,
    },
    db::{EndpointRepository, ForwardingRepository, RoutingRepository},
    models::{
        forwarding::{DeliveryOutcome, NewForwardingLog},
        routing::RouteTarget,
    },
};

// Limites dos campos de auditoria do log de entrega
const RESPONSE_BODY_MAX_CHARS: usize = 1_000;
const PAYLOAD_SNAPSHOT_MAX_CHARS: usize = 5_000;
// Bytes lidos do corpo da resposta (até 4 bytes por caractere UTF-8)
const RESPONSE_BODY_MAX_BYTES: usize = RESPONSE_BODY_MAX_CHARS * 4;

// =============================================================================
//  ERRO DE ENTREGA
// =============================================================================

/// Falha de uma entrega. Vai para o log e para o detalhe da resposta,
/// nunca vira falha da submissão.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Destino sem callback_url configurada")]
    MissingCallbackUrl,

    #[error("Falha na requisição HTTP: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Destino respondeu HTTP {status}")]
    HttpStatus { status: u16, body: String },
}

impl ForwardError {
    fn status_code(&self) -> Option<u16> {
        match self {
            ForwardError::HttpStatus { status, .. } => Some(*status),
            ForwardError::Request(e) => e.status().map(|s| s.as_u16()),
            ForwardError::MissingCallbackUrl => None,
        }
    }

    fn response_body(&self) -> Option<&str> {
        match self {
            ForwardError::HttpStatus { body, .. } => Some(body),
            _ => None,
        }
    }
}

// =============================================================================
//  CONTEXTO
// =============================================================================

/// O que está sendo entregue: ids de rastreio e o payload original.
#[derive(Debug, Clone)]
pub struct ForwardContext<'a> {
    pub lead_id: i64,
    pub contact_id: i64,
    pub appointment_id: Option<i64>,
    pub source_endpoint_id: Option<&'a str>,
    pub payload: &'a Value,
}

#[derive(Clone)]
pub struct ForwardingService {
    pool: PgPool,
    client: reqwest::Client,
    clock: SharedClock,
    forwarding_repo: ForwardingRepository,
    routing_repo: RoutingRepository,
    endpoint_repo: EndpointRepository,
}

impl ForwardingService {
    pub fn new(
        pool: PgPool,
        timeout: Duration,
        clock: SharedClock,
        forwarding_repo: ForwardingRepository,
        routing_repo: RoutingRepository,
        endpoint_repo: EndpointRepository,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("Falha ao criar cliente HTTP: {e}")))?;

        Ok(Self { pool, client, clock, forwarding_repo, routing_repo, endpoint_repo })
    }

    /// Entrega para cada destino, em ordem. Cada tentativa gera exatamente um
    /// log e incrementa os contadores; nada aqui retorna erro para o chamador.
    pub async fn dispatch(&self, ctx: &ForwardContext<'_>, targets: &[RouteTarget]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.deliver_one(ctx, target).await);
        }
        outcomes
    }

    async fn deliver_one(&self, ctx: &ForwardContext<'_>, target: &RouteTarget) -> DeliveryOutcome {
        let forwarded_at = self.clock.now();
        let body = enrich_payload(ctx, target, forwarded_at);

        let started = Instant::now();
        let result = match target.callback_url.as_deref() {
            Some(url) => self.send(url, ctx, target, forwarded_at, &body).await,
            None => Err(ForwardError::MissingCallbackUrl),
        };
        let duration_ms = i32::try_from(started.elapsed().as_millis()).unwrap_or(i32::MAX);

        let (success, status_code, response_body, error) = match &result {
            Ok((status, text)) => (true, Some(*status), Some(text.as_str()), None),
            Err(e) => (false, e.status_code(), e.response_body(), Some(e.to_string())),
        };

        if let Some(message) = &error {
            tracing::warn!(
                lead_id = ctx.lead_id,
                workspace_id = %target.workspace_id,
                rule_id = ?target.rule_id,
                error = %message,
                "Entrega do lead falhou"
            );
        } else {
            tracing::info!(
                lead_id = ctx.lead_id,
                workspace_id = %target.workspace_id,
                rule_id = ?target.rule_id,
                "Lead entregue"
            );
        }

        let log = NewForwardingLog {
            lead_id: ctx.lead_id,
            contact_id: ctx.contact_id,
            appointment_id: ctx.appointment_id,
            source_endpoint_id: ctx.source_endpoint_id.map(str::to_string),
            workspace_id: target.workspace_id.clone(),
            rule_id: target.rule_id,
            destination_url: target.callback_url.clone(),
            success,
            status_code: status_code.map(i32::from),
            response_body: response_body.map(|b| truncate_chars(b, RESPONSE_BODY_MAX_CHARS)),
            error_message: error.clone(),
            matched_product: target.matched_product.clone(),
            matched_zip: target.matched_zip.clone(),
            payload_snapshot: json_snapshot(&body, PAYLOAD_SNAPSHOT_MAX_CHARS),
            duration_ms,
        };

        self.record_attempt(ctx, target, &log).await;

        DeliveryOutcome {
            workspace_id: target.workspace_id.clone(),
            rule_id: target.rule_id,
            success,
            status_code,
            error,
        }
    }

    async fn send(
        &self,
        url: &str,
        ctx: &ForwardContext<'_>,
        target: &RouteTarget,
        forwarded_at: DateTime<Utc>,
        body: &Value,
    ) -> Result<(u16, String), ForwardError> {
        let mut request = self
            .client
            .post(url)
            .header("X-Lead-Id", ctx.lead_id.to_string())
            .header("X-Contact-Id", ctx.contact_id.to_string())
            .header("X-Forwarded-At", forwarded_at.to_rfc3339_opts(SecondsFormat::Millis, true));

        if let Some(endpoint_id) = ctx.source_endpoint_id {
            request = request.header("X-Source-Endpoint", endpoint_id);
        }
        if let Some(rule_id) = target.rule_id {
            request = request.header("X-Routing-Rule-Id", rule_id.to_string());
        }

        let response = request.json(body).send().await?;
        let status = response.status();
        let text = read_body_prefix(response, RESPONSE_BODY_MAX_BYTES).await;

        if !status.is_success() {
            return Err(ForwardError::HttpStatus { status: status.as_u16(), body: text });
        }
        Ok((status.as_u16(), text))
    }

    // Log + contadores. Falhas aqui são registradas e engolidas.
    async fn record_attempt(&self, ctx: &ForwardContext<'_>, target: &RouteTarget, log: &NewForwardingLog) {
        if let Err(e) = self.forwarding_repo.insert_log(&self.pool, log).await {
            tracing::error!(lead_id = ctx.lead_id, error = %e, "Falha ao gravar log de entrega");
        }

        if let Err(e) = self
            .routing_repo
            .record_forward_result(&self.pool, &target.workspace_id, log.success)
            .await
        {
            tracing::warn!(workspace_id = %target.workspace_id, error = %e, "Falha ao atualizar contadores do destino");
        }

        if let Some(endpoint_id) = ctx.source_endpoint_id {
            if let Err(e) = self
                .endpoint_repo
                .record_forward_result(&self.pool, endpoint_id, log.success)
                .await
            {
                tracing::warn!(endpoint_id, error = %e, "Falha ao atualizar contadores do endpoint");
            }
        }
    }
}

/// Lê no máximo `max_bytes` do corpo; o resto é descartado junto com a conexão.
/// Corpo ilegível não invalida a entrega.
async fn read_body_prefix(mut response: reqwest::Response, max_bytes: usize) -> String {
    let mut buf = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if push_capped(&mut buf, &chunk, max_bytes) {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Falha ao ler corpo da resposta do destino");
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// Acrescenta até completar `cap` bytes; `true` quando o limite foi atingido.
fn push_capped(buf: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let room = cap.saturating_sub(buf.len());
    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    buf.len() >= cap
}

// =============================================================================
//  ENRIQUECIMENTO
// =============================================================================

/// Payload original + `routing_metadata`. Payloads que não são objeto são
/// embrulhados em `{"payload": ...}`.
pub fn enrich_payload(ctx: &ForwardContext<'_>, target: &RouteTarget, forwarded_at: DateTime<Utc>) -> Value {
    let metadata = json!({
        "lead_id": ctx.lead_id,
        "contact_id": ctx.contact_id,
        "appointment_id": ctx.appointment_id,
        "source_endpoint_id": ctx.source_endpoint_id,
        "workspace_id": target.workspace_id,
        "rule_id": target.rule_id,
        "matched_product": target.matched_product,
        "matched_zip": target.matched_zip,
        "forwarded_at": forwarded_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    });

    let mut body = match ctx.payload {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_string(), other.clone());
            map
        }
    };
    body.insert("routing_metadata".to_string(), metadata);
    Value::Object(body)
}
