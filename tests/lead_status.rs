//! Ingestão de leads, transições de status e linha do tempo.

mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;

use common::{body_json, count, get, lead_payload, post_json, seed_endpoint, send_json, spawn_app};
use lead_router::{
    common::{clock::Clock, error::AppError},
    models::{
        lead::{LeadStatus, StatusChangeMeta},
        routing::{RoutingMethod, RoutingMode},
    },
};

fn by(actor: &str) -> StatusChangeMeta {
    StatusChangeMeta { actor: actor.to_string(), reason: None }
}

// ---------------------------------------------------------------------------
// Validação da submissão
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn short_phone_is_rejected_without_writes(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let err = app
        .state
        .lead_service
        .submit_lead("ep_solar", lead_payload("555-0199", "Solar", "90210"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::InvalidField { field: "phone", .. });
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM contacts").await, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM leads").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn missing_name_is_rejected(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let err = app
        .state
        .lead_service
        .submit_lead("ep_solar", json!({ "phone": "3105550199", "product": "Solar" }))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::InvalidField { field: "name", .. });
}

#[sqlx::test(migrations = "./migrations")]
async fn malformed_email_is_rejected(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let mut payload = lead_payload("3105550199", "Solar", "90210");
    payload["email"] = json!("nao-e-email");

    let err = app.state.lead_service.submit_lead("ep_solar", payload).await.unwrap_err();

    assert_matches!(err, AppError::ValidationError(_));
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_or_inactive_endpoint_is_not_found(pool: PgPool) {
    seed_endpoint(&pool, "ep_off", RoutingMode::FirstMatch).await;
    sqlx::query("UPDATE endpoints SET is_active = FALSE WHERE id = 'ep_off'")
        .execute(&pool)
        .await
        .unwrap();
    let app = spawn_app(pool.clone());
    let service = &app.state.lead_service;

    let err = service
        .submit_lead("ep_nope", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::NotFound { .. });

    let err = service
        .submit_lead("ep_off", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap_err();
    assert_matches!(err, AppError::NotFound { .. });
}

#[sqlx::test(migrations = "./migrations")]
async fn payload_with_repeated_field_spellings_is_accepted(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let payload = json!({
        "firstName": "Maria",
        "phone": "(310) 555-0199",
        "phoneNumber": "3105550199",
        "zip": "90210",
        "zipCode": "90210",
        "product": "Solar",
        "productType": "Solar"
    });
    let response = app.state.lead_service.submit_lead("ep_solar", payload).await.unwrap();

    let lead = app.state.lead_service.find_lead(response.lead_id).await.unwrap();
    assert_eq!(lead.product_type.as_deref(), Some("Solar"));
    assert_eq!(lead.zip_code.as_deref(), Some("90210"));
    assert_eq!(lead.raw_payload["phoneNumber"], "3105550199");

    let phone: String = sqlx::query_scalar("SELECT normalized_phone FROM contacts WHERE id = $1")
        .bind(response.contact_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(phone, "+13105550199");
}

#[sqlx::test(migrations = "./migrations")]
async fn lead_without_rules_is_stored_unrouted(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let response = app
        .state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap();

    assert_eq!(response.routing_method, RoutingMethod::Unrouted);
    assert!(response.matched_destinations.is_empty());
    assert!(response.deliveries.is_empty());

    let lead = app.state.lead_service.find_lead(response.lead_id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.product_type.as_deref(), Some("Solar"));
    assert_eq!(lead.raw_payload["phone"], "3105550199");
    assert!(lead.assigned_workspace_id.is_none());

    let total_leads: i64 = sqlx::query_scalar("SELECT total_leads FROM endpoints WHERE id = 'ep_solar'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(total_leads, 1);
}

// ---------------------------------------------------------------------------
// Transições
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn every_transition_is_recorded_in_order(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lead_service;

    let lead_id = service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap()
        .lead_id;

    let path = [LeadStatus::Contacted, LeadStatus::Negotiating, LeadStatus::New, LeadStatus::Lost];
    for status in path {
        service.update_lead_status(lead_id, status, &by("ana")).await.unwrap();
    }

    let history = service.lead_history(lead_id).await.unwrap();
    assert_eq!(history.len(), path.len());

    let mut previous = LeadStatus::New;
    for (row, expected) in history.iter().zip(path) {
        assert_eq!(row.old_status, previous);
        assert_eq!(row.new_status, expected);
        assert_eq!(row.changed_by, "ana");
        previous = expected;
    }

    let lead = service.find_lead(lead_id).await.unwrap();
    assert_eq!(lead.status, LeadStatus::Lost);

    let status_activities = service
        .lead_activities(lead_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.activity_type == "status_changed")
        .count();
    assert_eq!(status_activities, path.len());
}

#[sqlx::test(migrations = "./migrations")]
async fn same_status_transition_still_writes_history(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lead_service;

    let lead_id = service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap()
        .lead_id;

    let old = service.update_lead_status(lead_id, LeadStatus::New, &by("ana")).await.unwrap();

    assert_eq!(old, LeadStatus::New);
    assert_eq!(service.lead_history(lead_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_updates_form_a_consistent_chain(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let lead_id = app
        .state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap()
        .lead_id;

    let targets = [
        LeadStatus::Contacted,
        LeadStatus::Qualified,
        LeadStatus::ProposalSent,
        LeadStatus::Negotiating,
        LeadStatus::Rejected,
        LeadStatus::Lost,
    ];
    let mut handles = Vec::new();
    for status in targets {
        let service = app.state.lead_service.clone();
        handles.push(tokio::spawn(async move {
            service.update_lead_status(lead_id, status, &by("robo")).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let history = app.state.lead_service.lead_history(lead_id).await.unwrap();
    assert_eq!(history.len(), targets.len());

    // Sem atualização perdida: cada linha parte do status deixado pela anterior
    assert_eq!(history[0].old_status, LeadStatus::New);
    for pair in history.windows(2) {
        assert_eq!(pair[1].old_status, pair[0].new_status);
    }

    let lead = app.state.lead_service.find_lead(lead_id).await.unwrap();
    assert_eq!(lead.status, history.last().unwrap().new_status);
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_lead_is_not_found(pool: PgPool) {
    let app = spawn_app(pool.clone());

    let err = app
        .state
        .lead_service
        .update_lead_status(424_242, LeadStatus::Contacted, &by("ana"))
        .await
        .unwrap_err();

    assert_matches!(err, AppError::NotFound { .. });
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM lead_status_history").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn conversion_rolls_up_into_contact(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());
    let service = &app.state.lead_service;

    let mut payload = lead_payload("3105550199", "Solar", "90210");
    payload["revenueEstimate"] = json!(1500);
    let submitted = service.submit_lead("ep_solar", payload).await.unwrap();

    service.update_lead_status(submitted.lead_id, LeadStatus::Converted, &by("ana")).await.unwrap();
    // Repetir "converted" não conta de novo
    service.update_lead_status(submitted.lead_id, LeadStatus::Converted, &by("ana")).await.unwrap();

    let (lifetime_value, conversion_count, qualification): (Decimal, i32, String) = sqlx::query_as(
        "SELECT lifetime_value, conversion_count, qualification_status FROM contacts WHERE id = $1",
    )
    .bind(submitted.contact_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(lifetime_value, Decimal::from(1500));
    assert_eq!(conversion_count, 1);
    assert_eq!(qualification, "qualified");

    let lead = service.find_lead(submitted.lead_id).await.unwrap();
    assert_eq!(lead.converted_at, Some(app.clock.now()));
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn http_submit_and_patch_status(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let response = post_json(app.router(), "/api/endpoints/ep_solar/leads", lead_payload("3105550199", "Solar", "90210")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["routingMethod"], "unrouted");
    assert_eq!(created["isNewContact"], true);
    let lead_id = created["leadId"].as_i64().unwrap();

    let response = send_json(
        app.router(),
        Method::PATCH,
        &format!("/api/leads/{lead_id}/status"),
        Some(json!({ "status": "Contacted", "reason": "Retornou a ligação" })),
        Some("operador@empresa"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let changed = body_json(response).await;
    assert_eq!(changed["oldStatus"], "new");
    assert_eq!(changed["newStatus"], "contacted");

    let response = get(app.router(), &format!("/api/leads/{lead_id}/history")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    assert_eq!(history[0]["changedBy"], "operador@empresa");
    assert_eq!(history[0]["reason"], "Retornou a ligação");
}

#[sqlx::test(migrations = "./migrations")]
async fn http_rejects_unknown_status_and_bad_phone(pool: PgPool) {
    seed_endpoint(&pool, "ep_solar", RoutingMode::FirstMatch).await;
    let app = spawn_app(pool.clone());

    let response = post_json(app.router(), "/api/endpoints/ep_solar/leads", lead_payload("123", "Solar", "90210")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["details"]["phone"][0], "invalid_phone");

    let created = app
        .state
        .lead_service
        .submit_lead("ep_solar", lead_payload("3105550199", "Solar", "90210"))
        .await
        .unwrap();

    let response = send_json(
        app.router(),
        Method::PATCH,
        &format!("/api/leads/{}/status", created.lead_id),
        Some(json!({ "status": "archived" })),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_status");

    let response = post_json(app.router(), "/api/endpoints/ep_nope/leads", lead_payload("3105550199", "Solar", "90210")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn http_health_reports_ok(pool: PgPool) {
    let app = spawn_app(pool);

    let response = get(app.router(), "/api/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
