// src/services/appointment_service.rs

use serde_json::{json, Value};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    common::{clock::SharedClock, db_utils::non_blank, error::AppError, phone::normalize_phone},
    db::{AppointmentRepository, EndpointRepository, LeadRepository, RuleScope},
    models::{
        appointment::{AppointmentRequest, AppointmentResponse, NewAppointment},
        contact::ContactAttributes,
        lead::{Lead, LeadStatus, NewLead, StatusChangeMeta},
        routing::{Candidate, RoutingMode},
    },
    services::lead_service::LeadService,
};

const DEFAULT_PRIORITY: i32 = 50;

#[derive(Clone)]
pub struct AppointmentService {
    pool: PgPool,
    clock: SharedClock,
    appointment_repo: AppointmentRepository,
    lead_repo: LeadRepository,
    endpoint_repo: EndpointRepository,
    leads: LeadService,
}

impl AppointmentService {
    pub fn new(
        pool: PgPool,
        clock: SharedClock,
        appointment_repo: AppointmentRepository,
        lead_repo: LeadRepository,
        endpoint_repo: EndpointRepository,
        leads: LeadService,
    ) -> Self {
        Self { pool, clock, appointment_repo, lead_repo, endpoint_repo, leads }
    }

    /// Registra um agendamento.
    ///
    /// Com `lead_id`, o lead existente passa para `scheduled` (com histórico).
    /// Sem ele, contato e lead são criados a partir de `customer`, já em
    /// `scheduled`, no endpoint informado. O destino sai do `destination_hint`
    /// (prioridade) ou das regras ativas (primeiro match).
    ///
    /// O roteamento roda antes de abrir a transação; as escritas (lead,
    /// status, agendamento, atividade) commitam juntas. `payload` é guardado
    /// como veio, inclusive campos que o modelo não conhece.
    pub async fn submit_appointment(&self, payload: Value, actor: &str) -> Result<AppointmentResponse, AppError> {
        let req: AppointmentRequest = serde_json::from_value(payload.clone()).map_err(|e| {
            tracing::debug!(error = %e, "Payload de agendamento malformado");
            AppError::InvalidField { field: "payload", code: "malformed_payload" }
        })?;
        req.validate()?;

        // --- 1. Origem ---
        let origin = self.resolve_origin(&req).await?;

        // --- 2. Destino ---
        let decision = self
            .leads
            .decide(&origin.candidate(), req.destination_hint.as_deref(), RuleScope::AllActive, RoutingMode::FirstMatch)
            .await;
        let matched_destination = decision.targets.first().map(|t| t.workspace_id.clone());

        let mut tx = self.pool.begin().await?;

        // --- 3. Contato + lead ---
        let (lead, is_new_contact, created_lead) = match origin {
            Origin::Existing(current) => {
                if current.status != LeadStatus::Scheduled {
                    let meta = StatusChangeMeta {
                        actor: actor.to_string(),
                        reason: Some("Agendamento registrado".to_string()),
                    };
                    self.leads.transition_status(&mut tx, current.id, LeadStatus::Scheduled, &meta).await?;
                }

                let lead = self
                    .lead_repo
                    .find_by_id(&mut *tx, current.id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Lead", current.id))?;
                (lead, false, false)
            }
            Origin::New { endpoint_id, normalized_phone, attrs, product_type } => {
                let (contact, is_new) = self
                    .leads
                    .find_or_create_contact(&mut *tx, &endpoint_id, &normalized_phone, &attrs)
                    .await?;

                let fields = NewLead {
                    endpoint_id,
                    product_type,
                    zip_code: attrs.zip_code.clone(),
                    status: LeadStatus::Scheduled,
                    revenue_estimate: None,
                    priority: DEFAULT_PRIORITY,
                    raw_payload: payload.clone(),
                };
                let lead = self.leads.insert_lead(&mut tx, contact.id, &fields, actor).await?;
                (lead, is_new, true)
            }
        };

        // --- 4. Agendamento ---
        let schedule = &req.schedule;
        let appointment = self
            .appointment_repo
            .create(
                &mut *tx,
                &NewAppointment {
                    lead_id: lead.id,
                    contact_id: lead.contact_id,
                    workspace_id: matched_destination.clone(),
                    routing_method: decision.method,
                    scheduled_for: schedule.scheduled_for,
                    duration_minutes: schedule.duration_minutes,
                    timezone: non_blank(schedule.timezone.clone()),
                    notes: non_blank(schedule.notes.clone()),
                    product_type: lead.product_type.clone(),
                    zip_code: lead.zip_code.clone(),
                    raw_payload: payload.clone(),
                },
            )
            .await?;

        self.lead_repo
            .append_activity(
                &mut *tx,
                lead.id,
                "appointment_scheduled",
                "Agendamento registrado",
                actor,
                &json!({
                    "appointment_id": appointment.id,
                    "scheduled_for": appointment.scheduled_for,
                    "workspace_id": matched_destination,
                    "routing_method": decision.method,
                }),
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            lead_id = lead.id,
            appointment_id = appointment.id,
            routing_method = ?decision.method,
            "Agendamento registrado"
        );

        if created_lead {
            self.leads.record_intake_stats(&lead.endpoint_id, is_new_contact, self.clock.now()).await;
        }

        // --- 5. Entrega (best-effort) ---
        let deliveries = self.leads.deliver(&lead, &decision, Some(appointment.id), &forward_payload(&payload)).await;

        Ok(AppointmentResponse {
            contact_id: lead.contact_id,
            lead_id: lead.id,
            appointment_id: appointment.id,
            matched_destination,
            routing_method: decision.method,
            deliveries,
        })
    }

    // Valida a origem sem escrever nada: lead existente ou dados do cliente.
    async fn resolve_origin(&self, req: &AppointmentRequest) -> Result<Origin, AppError> {
        if let Some(lead_id) = req.lead_id {
            let lead = self
                .lead_repo
                .find_by_id(&self.pool, lead_id)
                .await?
                .ok_or_else(|| AppError::not_found("Lead", lead_id))?;
            return Ok(Origin::Existing(lead));
        }

        let endpoint_id = req
            .endpoint_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AppError::InvalidField { field: "endpoint_id", code: "required" })?;

        let endpoint = self
            .endpoint_repo
            .find_by_id(&self.pool, endpoint_id)
            .await?
            .filter(|e| e.accepts_submissions())
            .ok_or_else(|| AppError::not_found("Endpoint", endpoint_id))?;

        let customer = &req.customer;
        let normalized_phone = normalize_phone(customer.phone.as_deref())
            .ok_or(AppError::InvalidField { field: "phone", code: "invalid_phone" })?;

        let attrs = ContactAttributes {
            phone_raw: non_blank(customer.phone.clone()),
            first_name: non_blank(customer.first_name.clone()),
            last_name: non_blank(customer.last_name.clone()),
            email: non_blank(customer.email.clone()),
            address: non_blank(customer.address.clone()),
            city: non_blank(customer.city.clone()),
            state: non_blank(customer.state.clone()),
            zip_code: non_blank(customer.zip_code.clone()),
        };

        Ok(Origin::New {
            endpoint_id: endpoint.id,
            normalized_phone,
            attrs,
            product_type: non_blank(req.schedule.product_type.clone()),
        })
    }
}

enum Origin {
    Existing(Lead),
    New {
        endpoint_id: String,
        normalized_phone: String,
        attrs: ContactAttributes,
        product_type: Option<String>,
    },
}

impl Origin {
    fn candidate(&self) -> Candidate {
        match self {
            Origin::Existing(lead) => {
                Candidate { product_type: lead.product_type.clone(), zip_code: lead.zip_code.clone() }
            }
            Origin::New { attrs, product_type, .. } => {
                Candidate { product_type: product_type.clone(), zip_code: attrs.zip_code.clone() }
            }
        }
    }
}

// O destino recebe o agendamento com o tipo explícito
fn forward_payload(raw: &Value) -> Value {
    match raw {
        Value::Object(map) => {
            let mut body = map.clone();
            body.insert("type".to_string(), Value::String("appointment".to_string()));
            Value::Object(body)
        }
        other => other.clone(),
    }
}
