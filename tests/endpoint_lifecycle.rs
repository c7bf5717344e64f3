//! Ciclo de vida do endpoint: soft-delete, restauração e exclusão forçada.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::Duration;
use futures::TryStreamExt;
use sqlx::PgPool;
use uuid::Uuid;

use common::{body_json, count, get, lead_payload, seed_endpoint, send_json, spawn_app};
use lead_router::{
    common::{clock::Clock, error::AppError},
    db::{DeletionRepository, EndpointRepository},
    models::{
        deletion::{DeletionJob, DeletionJobStatus, PendingDeletion},
        endpoint::{Endpoint, EndpointState},
        routing::RoutingMode,
    },
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn endpoint(pool: &PgPool, id: &str) -> Option<Endpoint> {
    EndpointRepository::new(pool.clone()).find_by_id(pool, id).await.unwrap()
}

async fn job(pool: &PgPool, job_id: Uuid) -> DeletionJob {
    DeletionRepository::new(pool.clone())
        .find_job(pool, job_id)
        .await
        .unwrap()
        .expect("job deve existir")
}

async fn event_types(app: &common::TestApp, endpoint_id: &str) -> Vec<String> {
    app.state
        .lifecycle_service
        .lifecycle_events(endpoint_id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

// ---------------------------------------------------------------------------
// Soft-delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn soft_delete_schedules_permanent_deletion(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let now = app.clock.now();

    let result = app
        .state
        .lifecycle_service
        .soft_delete_endpoint("ep_solar", Some("Campanha encerrada"), "ana", false)
        .await
        .unwrap();

    assert!(!result.permanently_deleted);
    assert_eq!(result.scheduled_at, Some(now + Duration::hours(24)));
    let job_id = result.job_id.unwrap();

    let stored = endpoint(&pool, "ep_solar").await.unwrap();
    assert_eq!(
        stored.state(),
        EndpointState::SoftDeleted { scheduled_at: now + Duration::hours(24), job_id: Some(job_id) }
    );
    assert_eq!(stored.deletion_reason.as_deref(), Some("Campanha encerrada"));
    assert_eq!(stored.deleted_by.as_deref(), Some("ana"));

    let job = job(&pool, job_id).await;
    assert_eq!(job.status, DeletionJobStatus::Pending);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.scheduled_for, now + Duration::hours(24));

    assert_eq!(event_types(&app, "ep_solar").await, vec!["soft_deleted"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn second_soft_delete_conflicts(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    service.soft_delete_endpoint("ep_solar", None, "ana", false).await.unwrap();
    let err = service.soft_delete_endpoint("ep_solar", None, "ana", false).await.unwrap_err();

    assert_matches!(err, AppError::Conflict { current_state, .. } => {
        assert_eq!(current_state["state"], "soft_deleted");
    });
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM deletion_jobs").await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_endpoint_is_not_found(pool: PgPool) {
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    assert_matches!(
        service.soft_delete_endpoint("ep_nope", None, "ana", false).await.unwrap_err(),
        AppError::NotFound { .. }
    );
    assert_matches!(
        service.soft_delete_endpoint("ep_nope", None, "ana", true).await.unwrap_err(),
        AppError::NotFound { .. }
    );
    assert_matches!(
        service.restore_endpoint("ep_nope", "ana").await.unwrap_err(),
        AppError::NotFound { .. }
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn soft_deleted_endpoint_rejects_submissions(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    app.state
        .lifecycle_service
        .soft_delete_endpoint("ep_solar", None, "ana", false)
        .await
        .unwrap();

    let err = app
        .state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::NotFound { .. });
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM leads").await, 0);
}

// ---------------------------------------------------------------------------
// Restauração
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn restore_within_window_cancels_job(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    let job_id = service
        .soft_delete_endpoint("ep_solar", None, "ana", false)
        .await
        .unwrap()
        .job_id
        .unwrap();

    app.clock.advance(Duration::hours(23));
    let restored = service.restore_endpoint("ep_solar", "bia").await.unwrap();

    assert_eq!(restored.restored_at, app.clock.now());

    let stored = endpoint(&pool, "ep_solar").await.unwrap();
    assert_eq!(stored.state(), EndpointState::Active);
    assert!(stored.deletion_job_id.is_none());
    assert!(stored.accepts_submissions());

    let job = job(&pool, job_id).await;
    assert_eq!(job.status, DeletionJobStatus::Cancelled);
    assert!(job.status.is_terminal());
    assert_eq!(event_types(&app, "ep_solar").await, vec!["soft_deleted", "restored"]);

    // Volta a aceitar leads
    app.state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "./migrations")]
async fn restore_after_window_is_rejected(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    let deleted = service.soft_delete_endpoint("ep_solar", None, "ana", false).await.unwrap();
    app.clock.advance(Duration::hours(25));

    let err = service.restore_endpoint("ep_solar", "bia").await.unwrap_err();

    assert_matches!(err, AppError::WindowExpired { scheduled_at } => {
        assert_eq!(Some(scheduled_at), deleted.scheduled_at);
    });
    let stored = endpoint(&pool, "ep_solar").await.unwrap();
    assert_matches!(stored.state(), EndpointState::SoftDeleted { .. });
    assert_eq!(job(&pool, deleted.job_id.unwrap()).await.status, DeletionJobStatus::Pending);
}

#[sqlx::test(migrations = "./migrations")]
async fn restore_window_closes_exactly_at_scheduled_time(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    let scheduled_at = service
        .soft_delete_endpoint("ep_solar", None, "ana", false)
        .await
        .unwrap()
        .scheduled_at
        .unwrap();

    app.clock.set(scheduled_at);
    assert_matches!(
        service.restore_endpoint("ep_solar", "bia").await.unwrap_err(),
        AppError::WindowExpired { .. }
    );

    app.clock.set(scheduled_at - Duration::seconds(1));
    service.restore_endpoint("ep_solar", "bia").await.unwrap();
    assert_eq!(endpoint(&pool, "ep_solar").await.unwrap().state(), EndpointState::Active);
}

#[sqlx::test(migrations = "./migrations")]
async fn restore_of_active_endpoint_is_not_found(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let err = app.state.lifecycle_service.restore_endpoint("ep_solar", "ana").await.unwrap_err();

    assert_matches!(err, AppError::NotFound { .. });
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM endpoint_lifecycle_events").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn delete_restore_delete_gets_a_fresh_job(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    let first = service.soft_delete_endpoint("ep_solar", None, "ana", false).await.unwrap();
    service.restore_endpoint("ep_solar", "ana").await.unwrap();
    let second = service.soft_delete_endpoint("ep_solar", None, "ana", false).await.unwrap();

    assert_ne!(first.job_id, second.job_id);
    assert_eq!(job(&pool, first.job_id.unwrap()).await.status, DeletionJobStatus::Cancelled);
    assert_eq!(job(&pool, second.job_id.unwrap()).await.status, DeletionJobStatus::Pending);
}

// ---------------------------------------------------------------------------
// Exclusão forçada
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn force_delete_cancels_job_and_keeps_leads(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    app.state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap();

    let service = &app.state.lifecycle_service;
    let job_id = service
        .soft_delete_endpoint("ep_solar", None, "ana", false)
        .await
        .unwrap()
        .job_id
        .unwrap();

    let result = service
        .soft_delete_endpoint("ep_solar", Some("Fraude"), "ana", true)
        .await
        .unwrap();

    assert!(result.permanently_deleted);
    assert!(endpoint(&pool, "ep_solar").await.is_none());
    assert_eq!(job(&pool, job_id).await.status, DeletionJobStatus::Cancelled);

    // Histórico sobrevive à remoção do endpoint
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM leads").await, 1);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM contacts").await, 1);

    let events = service.lifecycle_events("ep_solar").await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type, "force_deleted");
    assert_eq!(events[1].job_id, Some(job_id));
    assert_eq!(events[1].details["was_soft_deleted"], true);
    assert_eq!(events[1].details["total_leads"], 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn force_delete_of_active_endpoint(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let result = app
        .state
        .lifecycle_service
        .force_delete_endpoint("ep_solar", None, "ana")
        .await
        .unwrap();

    assert!(result.permanently_deleted);
    assert!(result.job_id.is_none());
    assert!(endpoint(&pool, "ep_solar").await.is_none());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM deletion_jobs").await, 0);
}

// ---------------------------------------------------------------------------
// Listagem
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn pending_listing_is_ordered_and_restartable(pool: PgPool) {
    seed_endpoint(&pool, "ep_a", RoutingMode::FirstMatch).await;
    seed_endpoint(&pool, "ep_b", RoutingMode::FirstMatch).await;
    seed_endpoint(&pool, "ep_c", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lifecycle_service;

    service.soft_delete_endpoint("ep_b", None, "ana", false).await.unwrap();
    app.clock.advance(Duration::minutes(5));
    service.soft_delete_endpoint("ep_a", None, "ana", false).await.unwrap();

    let first: Vec<PendingDeletion> = service.list_pending_deletions().try_collect().await.unwrap();
    let second: Vec<PendingDeletion> = service.list_pending_deletions().try_collect().await.unwrap();

    let ids: Vec<&str> = first.iter().map(|p| p.endpoint_id.as_str()).collect();
    assert_eq!(ids, vec!["ep_b", "ep_a"]);
    assert_eq!(first, second);

    service.restore_endpoint("ep_b", "ana").await.unwrap();
    let after_restore: Vec<PendingDeletion> = service.list_pending_deletions().try_collect().await.unwrap();
    assert_eq!(after_restore.len(), 1);
    assert_eq!(after_restore[0].endpoint_id, "ep_a");
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn http_lifecycle_round_trip(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let response = send_json(
        app.router(),
        Method::DELETE,
        "/api/endpoints/ep_solar?reason=Teste",
        None,
        Some("operador"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = body_json(response).await;
    assert_eq!(deleted["permanentlyDeleted"], false);
    assert!(deleted["jobId"].is_string());

    let response = send_json(app.router(), Method::DELETE, "/api/endpoints/ep_solar", None, None).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = body_json(response).await;
    assert_eq!(conflict["error"], "conflict");
    assert_eq!(conflict["currentState"]["state"], "soft_deleted");

    let response = get(app.router(), "/api/deletions/pending").await;
    assert_eq!(response.status(), StatusCode::OK);
    let pending = body_json(response).await;
    assert_eq!(pending[0]["endpointId"], "ep_solar");

    let response = send_json(app.router(), Method::POST, "/api/endpoints/ep_solar/restore", None, Some("operador")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send_json(app.router(), Method::POST, "/api/endpoints/ep_solar/restore", None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(app.router(), "/api/endpoints/ep_solar/events").await;
    let events = body_json(response).await;
    assert_eq!(events[0]["eventType"], "soft_deleted");
    assert_eq!(events[0]["actor"], "operador");
    assert_eq!(events[0]["reason"], "Teste");
    assert_eq!(events[1]["eventType"], "restored");
}

#[sqlx::test(migrations = "./migrations")]
async fn http_restore_after_window_is_gone(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    send_json(app.router(), Method::DELETE, "/api/endpoints/ep_solar", None, None).await;
    app.clock.advance(Duration::hours(24));

    let response = send_json(app.router(), Method::POST, "/api/endpoints/ep_solar/restore", None, None).await;

    assert_eq!(response.status(), StatusCode::GONE);
    assert_eq!(body_json(response).await["error"], "window_expired");
}

#[sqlx::test(migrations = "./migrations")]
async fn http_force_delete(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let response = send_json(app.router(), Method::DELETE, "/api/endpoints/ep_solar?force=true", None, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["permanentlyDeleted"], true);
    assert!(endpoint(&pool, "ep_solar").await.is_none());

    let events = app.state.lifecycle_service.lifecycle_events("ep_solar").await.unwrap();
    assert_eq!(events[0].actor, "anonymous");
}
