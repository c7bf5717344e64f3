// src/services/lead_service.rs

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use sqlx::{Executor, PgPool, Postgres, Transaction};
use validator::Validate;

use crate::{
    common::{clock::SharedClock, db_utils::non_blank, error::AppError, phone::normalize_phone},
    db::{ContactRepository, DailyStatsDelta, EndpointRepository, LeadRepository, RuleScope},
    models::{
        contact::{Contact, ContactAttributes},
        forwarding::DeliveryOutcome,
        lead::{Lead, LeadActivity, LeadStatus, LeadStatusHistory, LeadSubmission, NewLead, StatusChangeMeta, SubmitLeadResponse},
        routing::{Candidate, RoutingDecision, RoutingMode},
    },
    services::{
        forwarding_service::{ForwardContext, ForwardingService},
        routing_service::RoutingService,
    },
};

// Ator das escritas feitas pela própria ingestão
pub(crate) const SYSTEM_ACTOR: &str = "system";

const DEFAULT_PRIORITY: i32 = 50;

/// Resultado da distribuição de um lead (roteamento + entregas).
#[derive(Debug, Clone)]
pub struct Distribution {
    pub decision: RoutingDecision,
    pub deliveries: Vec<DeliveryOutcome>,
}

#[derive(Clone)]
pub struct LeadService {
    pool: PgPool,
    clock: SharedClock,
    contact_repo: ContactRepository,
    lead_repo: LeadRepository,
    endpoint_repo: EndpointRepository,
    routing: RoutingService,
    forwarding: ForwardingService,
}

impl LeadService {
    pub fn new(
        pool: PgPool,
        clock: SharedClock,
        contact_repo: ContactRepository,
        lead_repo: LeadRepository,
        endpoint_repo: EndpointRepository,
        routing: RoutingService,
        forwarding: ForwardingService,
    ) -> Self {
        Self { pool, clock, contact_repo, lead_repo, endpoint_repo, routing, forwarding }
    }

    // =========================================================================
    //  1. CONTATOS
    // =========================================================================

    /// Busca-ou-cria o contato de (endpoint, telefone normalizado).
    /// Seguro sob concorrência: a constraint única decide, nunca duas linhas.
    pub async fn find_or_create_contact<'e, E>(
        &self,
        executor: E,
        endpoint_id: &str,
        normalized_phone: &str,
        attrs: &ContactAttributes,
    ) -> Result<(Contact, bool), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let upserted = self
            .contact_repo
            .upsert(executor, endpoint_id, normalized_phone, attrs, self.clock.now())
            .await?;

        Ok((upserted.contact, upserted.is_new))
    }

    // =========================================================================
    //  2. LEADS
    // =========================================================================

    /// Cria um lead para um contato já existente.
    pub async fn create_lead(&self, contact_id: i64, fields: NewLead) -> Result<Lead, AppError> {
        if self.contact_repo.find_by_id(contact_id).await?.is_none() {
            return Err(AppError::not_found("Contato", contact_id));
        }

        let mut tx = self.pool.begin().await?;
        let lead = self.insert_lead(&mut tx, contact_id, &fields, SYSTEM_ACTOR).await?;
        tx.commit().await?;

        self.record_intake_stats(&lead.endpoint_id, false, lead.created_at).await;

        Ok(lead)
    }

    /// Insere o lead, soma no contato e abre a linha do tempo. Roda dentro da
    /// transação de quem chama.
    pub(crate) async fn insert_lead(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        contact_id: i64,
        fields: &NewLead,
        actor: &str,
    ) -> Result<Lead, AppError> {
        let lead = self.lead_repo.create(&mut **tx, contact_id, fields, self.clock.now()).await?;
        self.contact_repo.increment_total_leads(&mut **tx, contact_id).await?;
        self.lead_repo
            .append_activity(
                &mut **tx,
                lead.id,
                "lead_created",
                "Lead recebido",
                actor,
                &json!({ "status": lead.status, "endpoint_id": lead.endpoint_id }),
            )
            .await?;

        Ok(lead)
    }

    /// Transição de status. Qualquer valor pode suceder qualquer outro, mas
    /// toda transição gera uma linha de histórico e uma atividade.
    pub async fn update_lead_status(
        &self,
        lead_id: i64,
        new_status: LeadStatus,
        meta: &StatusChangeMeta,
    ) -> Result<LeadStatus, AppError> {
        let mut tx = self.pool.begin().await?;
        let old_status = self.transition_status(&mut tx, lead_id, new_status, meta).await?;
        tx.commit().await?;

        tracing::info!(lead_id, old_status = %old_status, new_status = %new_status, actor = %meta.actor, "Status do lead alterado");

        Ok(old_status)
    }

    pub(crate) async fn transition_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        lead_id: i64,
        new_status: LeadStatus,
        meta: &StatusChangeMeta,
    ) -> Result<LeadStatus, AppError> {
        // FOR UPDATE: transições concorrentes do mesmo lead entram em fila
        let lead = self
            .lead_repo
            .lock_for_update(&mut **tx, lead_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lead", lead_id))?;

        let old_status = lead.status;
        let now = self.clock.now();

        self.lead_repo.set_status(&mut **tx, lead_id, new_status, now).await?;
        self.lead_repo
            .append_history(&mut **tx, lead_id, old_status, new_status, &meta.actor, meta.reason.as_deref(), now)
            .await?;
        self.lead_repo
            .append_activity(
                &mut **tx,
                lead_id,
                "status_changed",
                &format!("Status alterado de {} para {}", old_status, new_status),
                &meta.actor,
                &json!({ "old_status": old_status, "new_status": new_status, "reason": meta.reason }),
            )
            .await?;

        // Agregados do contato
        match new_status {
            LeadStatus::Converted if old_status != LeadStatus::Converted => {
                self.contact_repo
                    .record_conversion(&mut **tx, lead.contact_id, lead.revenue_estimate)
                    .await?;
            }
            LeadStatus::Qualified => {
                self.contact_repo.mark_qualified(&mut **tx, lead.contact_id).await?;
            }
            _ => {}
        }

        Ok(old_status)
    }

    pub async fn lead_history(&self, lead_id: i64) -> Result<Vec<LeadStatusHistory>, AppError> {
        self.require_lead(lead_id).await?;
        self.lead_repo.list_history(lead_id).await
    }

    pub async fn lead_activities(&self, lead_id: i64) -> Result<Vec<LeadActivity>, AppError> {
        self.require_lead(lead_id).await?;
        self.lead_repo.list_activities(lead_id).await
    }

    pub async fn find_lead(&self, lead_id: i64) -> Result<Lead, AppError> {
        self.require_lead(lead_id).await
    }

    async fn require_lead(&self, lead_id: i64) -> Result<Lead, AppError> {
        self.lead_repo
            .find_by_id(&self.pool, lead_id)
            .await?
            .ok_or_else(|| AppError::not_found("Lead", lead_id))
    }

    // =========================================================================
    //  3. SUBMISSÃO (ingestão completa)
    // =========================================================================

    /// Contato -> lead -> roteamento -> entregas, nesta ordem.
    ///
    /// Só a persistência do contato/lead pode falhar a chamada. Roteamento,
    /// entregas e estatísticas são secundários: falhas são registradas e
    /// aparecem apenas no detalhe da resposta.
    pub async fn submit_lead(&self, endpoint_id: &str, payload: Value) -> Result<SubmitLeadResponse, AppError> {
        let submission: LeadSubmission = serde_json::from_value(payload.clone()).map_err(|e| {
            tracing::debug!(endpoint_id, error = %e, "Payload de lead malformado");
            AppError::InvalidField { field: "payload", code: "malformed_payload" }
        })?;
        submission.validate()?;

        let normalized_phone = normalize_phone(submission.phone.as_deref())
            .ok_or(AppError::InvalidField { field: "phone", code: "invalid_phone" })?;

        let (first_name, last_name) = submission.names();
        if first_name.is_none() && last_name.is_none() {
            return Err(AppError::InvalidField { field: "name", code: "required" });
        }

        let endpoint = self
            .endpoint_repo
            .find_by_id(&self.pool, endpoint_id)
            .await?
            .filter(|e| e.accepts_submissions())
            .ok_or_else(|| AppError::not_found("Endpoint", endpoint_id))?;

        let attrs = ContactAttributes {
            phone_raw: non_blank(submission.phone.clone()),
            first_name,
            last_name,
            email: non_blank(submission.email.clone()),
            address: non_blank(submission.address.clone()),
            city: non_blank(submission.city.clone()),
            state: non_blank(submission.state.clone()),
            zip_code: non_blank(submission.zip_code.clone()),
        };

        let fields = NewLead {
            endpoint_id: endpoint.id.clone(),
            product_type: non_blank(submission.product_type.clone()),
            zip_code: non_blank(submission.zip_code.clone()),
            status: LeadStatus::New,
            revenue_estimate: submission.revenue_estimate,
            priority: submission.priority.unwrap_or(DEFAULT_PRIORITY),
            raw_payload: payload,
        };

        // --- Caminho primário: uma transação ---
        let mut tx = self.pool.begin().await?;
        let (contact, is_new_contact) =
            self.find_or_create_contact(&mut *tx, &endpoint.id, &normalized_phone, &attrs).await?;
        let lead = self.insert_lead(&mut tx, contact.id, &fields, SYSTEM_ACTOR).await?;
        tx.commit().await?;

        tracing::info!(
            endpoint_id = %endpoint.id,
            contact_id = contact.id,
            lead_id = lead.id,
            is_new_contact,
            "Lead registrado"
        );

        self.record_intake_stats(&endpoint.id, is_new_contact, lead.created_at).await;

        // --- Caminho secundário ---
        let distribution = self
            .distribute(
                &lead,
                submission.destination_id.as_deref(),
                RuleScope::SourceEndpoint(&endpoint.id),
                endpoint.routing_mode,
                None,
            )
            .await;

        Ok(SubmitLeadResponse {
            contact_id: contact.id,
            lead_id: lead.id,
            is_new_contact,
            routing_method: distribution.decision.method,
            matched_destinations: distribution.decision.targets.iter().map(|t| t.workspace_id.clone()).collect(),
            deliveries: distribution.deliveries,
        })
    }

    /// Roteia e entrega um lead já gravado. Nunca falha: erro de roteamento
    /// é tratado como "não roteado" e registrado.
    pub(crate) async fn distribute(
        &self,
        lead: &Lead,
        explicit_destination: Option<&str>,
        scope: RuleScope<'_>,
        mode: RoutingMode,
        appointment_id: Option<i64>,
    ) -> Distribution {
        let candidate = Candidate { product_type: lead.product_type.clone(), zip_code: lead.zip_code.clone() };
        let decision = self.decide(&candidate, explicit_destination, scope, mode).await;
        let deliveries = self.deliver(lead, &decision, appointment_id, &lead.raw_payload).await;
        Distribution { decision, deliveries }
    }

    /// Escolhe os destinos. Não usa transação: nunca deve rodar enquanto o
    /// chamador segura uma conexão do pool.
    pub(crate) async fn decide(
        &self,
        candidate: &Candidate,
        explicit_destination: Option<&str>,
        scope: RuleScope<'_>,
        mode: RoutingMode,
    ) -> RoutingDecision {
        match self.routing.route(explicit_destination, candidate, scope, mode).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(product_type = ?candidate.product_type, error = %e, "Falha ao avaliar regras de roteamento");
                RoutingDecision::unrouted()
            }
        }
    }

    pub(crate) async fn deliver(
        &self,
        lead: &Lead,
        decision: &RoutingDecision,
        appointment_id: Option<i64>,
        payload: &Value,
    ) -> Vec<DeliveryOutcome> {
        if decision.targets.is_empty() {
            tracing::info!(lead_id = lead.id, "Lead sem destino (não roteado)");
            return Vec::new();
        }

        let ctx = ForwardContext {
            lead_id: lead.id,
            contact_id: lead.contact_id,
            appointment_id,
            source_endpoint_id: Some(&lead.endpoint_id),
            payload,
        };
        let deliveries = self.forwarding.dispatch(&ctx, &decision.targets).await;

        self.record_delivery_effects(lead, &deliveries).await;

        deliveries
    }

    // =========================================================================
    //  4. EFEITOS PÓS-COMMIT (best-effort)
    // =========================================================================

    pub(crate) async fn record_intake_stats(&self, endpoint_id: &str, is_new_contact: bool, at: DateTime<Utc>) {
        if let Err(e) = self.endpoint_repo.record_lead_received(endpoint_id, at).await {
            tracing::warn!(endpoint_id, error = %e, "Falha ao atualizar contadores do endpoint");
        }

        let delta = DailyStatsDelta {
            leads_received: 1,
            new_contacts: i32::from(is_new_contact),
            ..Default::default()
        };
        if let Err(e) = self.endpoint_repo.bump_daily_stats(endpoint_id, at.date_naive(), delta).await {
            tracing::warn!(endpoint_id, error = %e, "Falha ao atualizar estatística diária");
        }
    }

    async fn record_delivery_effects(&self, lead: &Lead, deliveries: &[DeliveryOutcome]) {
        for outcome in deliveries {
            let (activity_type, description) = if outcome.success {
                ("lead_forwarded", format!("Lead entregue para {}", outcome.workspace_id))
            } else {
                ("forward_failed", format!("Falha ao entregar para {}", outcome.workspace_id))
            };
            let metadata = json!({
                "workspace_id": outcome.workspace_id,
                "rule_id": outcome.rule_id,
                "status_code": outcome.status_code,
                "error": outcome.error,
            });
            if let Err(e) = self
                .lead_repo
                .append_activity(&self.pool, lead.id, activity_type, &description, SYSTEM_ACTOR, &metadata)
                .await
            {
                tracing::warn!(lead_id = lead.id, error = %e, "Falha ao registrar atividade de entrega");
            }
        }

        if let Some(first_ok) = deliveries.iter().find(|d| d.success) {
            if let Err(e) = self.lead_repo.assign_workspace(&self.pool, lead.id, &first_ok.workspace_id).await {
                tracing::warn!(lead_id = lead.id, error = %e, "Falha ao registrar destino do lead");
            }
        }

        let succeeded = deliveries.iter().filter(|d| d.success).count();
        let delta = DailyStatsDelta {
            forwards_succeeded: i32::try_from(succeeded).unwrap_or(i32::MAX),
            forwards_failed: i32::try_from(deliveries.len() - succeeded).unwrap_or(i32::MAX),
            ..Default::default()
        };
        let day = self.clock.now().date_naive();
        if let Err(e) = self.endpoint_repo.bump_daily_stats(&lead.endpoint_id, day, delta).await {
            tracing::warn!(endpoint_id = %lead.endpoint_id, error = %e, "Falha ao atualizar estatística diária");
        }
    }
}
