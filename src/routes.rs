// src/routes.rs

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

/// Monta o router completo. O `main` e os testes de integração usam o mesmo.
pub fn build_router(app_state: AppState) -> Router {
    let lead_routes = Router::new()
        .route("/{lead_id}/status", patch(handlers::leads::update_lead_status))
        .route("/{lead_id}/history", get(handlers::leads::lead_history))
        .route("/{lead_id}/activities", get(handlers::leads::lead_activities));

    let endpoint_routes = Router::new()
        .route("/{endpoint_id}", delete(handlers::endpoints::soft_delete_endpoint))
        .route("/{endpoint_id}/leads", post(handlers::leads::submit_lead))
        .route("/{endpoint_id}/restore", post(handlers::endpoints::restore_endpoint))
        .route("/{endpoint_id}/events", get(handlers::endpoints::lifecycle_events));

    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/appointments", post(handlers::appointments::submit_appointment))
        .route("/api/deletions/pending", get(handlers::endpoints::list_pending_deletions))
        .nest("/api/leads", lead_routes)
        .nest("/api/endpoints", endpoint_routes)
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
