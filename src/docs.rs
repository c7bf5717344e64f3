// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Lead Router",
        description = "Ingestão, deduplicação, roteamento e encaminhamento de leads"
    ),
    paths(
        // --- Health ---
        handlers::health::health,

        // --- Leads ---
        handlers::leads::submit_lead,
        handlers::leads::update_lead_status,
        handlers::leads::lead_history,
        handlers::leads::lead_activities,

        // --- Agendamentos ---
        handlers::appointments::submit_appointment,

        // --- Endpoints ---
        handlers::endpoints::soft_delete_endpoint,
        handlers::endpoints::restore_endpoint,
        handlers::endpoints::lifecycle_events,
        handlers::endpoints::list_pending_deletions,
    ),
    components(
        schemas(
            // --- Leads ---
            models::lead::LeadStatus,
            models::lead::Lead,
            models::lead::LeadStatusHistory,
            models::lead::LeadActivity,
            models::lead::LeadSubmission,
            models::lead::SubmitLeadResponse,
            models::contact::Contact,

            // --- Roteamento ---
            models::routing::RoutingMode,
            models::routing::RoutingMethod,
            models::routing::Workspace,
            models::forwarding::DeliveryOutcome,
            models::forwarding::ForwardingLogEntry,

            // --- Agendamentos ---
            models::appointment::Appointment,
            models::appointment::AppointmentRequest,
            models::appointment::CustomerFields,
            models::appointment::ScheduleFields,
            models::appointment::AppointmentResponse,

            // --- Endpoints ---
            models::endpoint::Endpoint,
            models::endpoint::EndpointState,
            models::deletion::DeletionJobStatus,
            models::deletion::DeletionJob,
            models::deletion::PendingDeletion,
            models::deletion::LifecycleEvent,
            models::deletion::SoftDeleteResult,
            models::deletion::RestoreResult,

            // --- Payloads ---
            handlers::leads::UpdateLeadStatusPayload,
            handlers::leads::LeadStatusChanged,
        )
    ),
    tags(
        (name = "Health", description = "Disponibilidade do serviço"),
        (name = "Leads", description = "Ingestão, status e histórico de leads"),
        (name = "Agendamentos", description = "Agendamentos e seu roteamento"),
        (name = "Endpoints", description = "Ciclo de vida dos endpoints (soft delete, restauração, exclusão)")
    )
)]
pub struct ApiDoc;
