//! Utilitários compartilhados pelos testes de integração.
//!
//! Cada teste recebe um banco isolado do `#[sqlx::test]`, já migrado.

#![allow(dead_code)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode},
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::{SubsecRound, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower::ServiceExt;

use lead_router::{
    background::deletion_queue::{DeletionQueue, DeletionQueueReceiver},
    common::clock::{ManualClock, SharedClock},
    config::{AppState, Settings},
    models::routing::RoutingMode,
    routes,
};

/// Porta 9 (discard) recusa a conexão na hora.
pub const DEAD_CALLBACK: &str = "http://127.0.0.1:9/hook";

// ---------------------------------------------------------------------------
// Aplicação
// ---------------------------------------------------------------------------

pub fn test_settings() -> Settings {
    Settings {
        database_url: String::new(),
        database_max_connections: 5,
        bind_addr: "127.0.0.1:0".to_string(),
        forward_timeout: Duration::from_secs(2),
        deletion_grace: chrono::Duration::hours(24),
        deletion_sweep_interval: Duration::from_secs(3600),
        deletion_max_attempts: 3,
        deletion_retry_base: Duration::from_millis(50),
    }
}

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    /// Lado consumidor da fila. Fica aqui para o canal não fechar.
    pub queue_rx: Option<DeletionQueueReceiver>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        routes::build_router(self.state.clone())
    }

    pub fn take_queue(&mut self) -> DeletionQueueReceiver {
        self.queue_rx.take().expect("fila já consumida")
    }
}

pub fn spawn_app(pool: PgPool) -> TestApp {
    spawn_app_with(pool, test_settings())
}

pub fn spawn_app_with(pool: PgPool, settings: Settings) -> TestApp {
    // Precisão do Postgres (microssegundos), para comparar timestamps gravados
    let clock = Arc::new(ManualClock::new(Utc::now().trunc_subsecs(6)));
    let shared: SharedClock = clock.clone();
    let (queue, queue_rx) = DeletionQueue::channel();

    let state = AppState::with_pool(pool, settings, shared, queue).expect("estado de teste");

    TestApp { state, clock, queue_rx: Some(queue_rx) }
}

// ---------------------------------------------------------------------------
// Dados de apoio (SQL direto, sem passar pelos serviços)
// ---------------------------------------------------------------------------

pub async fn seed_endpoint(pool: &PgPool, id: &str, mode: RoutingMode) {
    sqlx::query("INSERT INTO endpoints (id, name, routing_mode) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("Endpoint {id}"))
        .bind(mode)
        .execute(pool)
        .await
        .expect("seed endpoint");
}

pub async fn seed_workspace(pool: &PgPool, id: &str, callback_url: Option<&str>) {
    sqlx::query("INSERT INTO workspaces (id, name, callback_url) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(format!("Workspace {id}"))
        .bind(callback_url)
        .execute(pool)
        .await
        .expect("seed workspace");
}

pub async fn seed_rule(
    pool: &PgPool,
    workspace_id: &str,
    source_endpoint_id: Option<&str>,
    products: &[&str],
    zips: &[&str],
    priority: i32,
) -> i64 {
    let products: Vec<String> = products.iter().map(|p| p.to_string()).collect();
    let zips: Vec<String> = zips.iter().map(|z| z.to_string()).collect();

    sqlx::query_scalar(
        r#"
        INSERT INTO routing_rules (workspace_id, source_endpoint_id, product_types, zip_codes, priority)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(workspace_id)
    .bind(source_endpoint_id)
    .bind(products)
    .bind(zips)
    .bind(priority)
    .fetch_one(pool)
    .await
    .expect("seed rule")
}

pub fn lead_payload(phone: &str, product: &str, zip: &str) -> Value {
    json!({
        "firstName": "Maria",
        "lastName": "Souza",
        "email": "maria@example.com",
        "phone": phone,
        "product": product,
        "zip": zip,
    })
}

pub async fn count(pool: &PgPool, sql: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await.expect("count")
}

// ---------------------------------------------------------------------------
// Destino HTTP falso
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReceivedHook {
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct HookServer {
    pub url: String,
    pub received: Arc<Mutex<Vec<ReceivedHook>>>,
}

impl HookServer {
    pub fn hits(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

#[derive(Clone)]
struct HookState {
    status: StatusCode,
    received: Arc<Mutex<Vec<ReceivedHook>>>,
}

async fn hook(State(state): State<HookState>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    state.received.lock().unwrap().push(ReceivedHook { headers, body });
    state.status
}

/// Sobe um servidor local que responde sempre com `status`.
pub async fn spawn_hook_server(status: StatusCode) -> HookServer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(hook))
        .with_state(HookState { status, received: received.clone() });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    HookServer { url: format!("http://{addr}/hook"), received }
}

/// Destino que responde 200 com um corpo de `len` bytes.
pub async fn spawn_verbose_server(len: usize) -> String {
    let app = Router::new().route("/hook", post(move || async move { "x".repeat(len) }));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/hook")
}

// ---------------------------------------------------------------------------
// Requisições HTTP (oneshot no router)
// ---------------------------------------------------------------------------

pub async fn send_json(app: Router, method: Method, uri: &str, body: Option<Value>, actor: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder.header("x-actor-id", actor);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send_json(app, Method::GET, uri, None, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send_json(app, Method::POST, uri, Some(body), None).await
}

pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
