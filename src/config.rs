// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    background::deletion_queue::DeletionQueue,
    common::clock::SharedClock,
    db::{
        AppointmentRepository, ContactRepository, DeletionRepository, EndpointRepository, ForwardingRepository,
        LeadRepository, RoutingRepository,
    },
    services::{AppointmentService, ForwardingService, LeadService, LifecyclePolicy, LifecycleService, RoutingService},
};

// =============================================================================
//  CONFIGURAÇÃO (variáveis de ambiente)
// =============================================================================

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub forward_timeout: Duration,
    pub deletion_grace: chrono::Duration,
    pub deletion_sweep_interval: Duration,
    pub deletion_max_attempts: i32,
    pub deletion_retry_base: Duration,
}

impl Settings {
    /// Carrega o `.env` (se existir) e lê as variáveis. Só `DATABASE_URL` é obrigatória.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;

        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            forward_timeout: Duration::from_secs(env_or("FORWARD_TIMEOUT_SECS", 10)),
            deletion_grace: chrono::Duration::hours(env_or("DELETION_GRACE_HOURS", 24)),
            deletion_sweep_interval: Duration::from_secs(env_or("DELETION_SWEEP_INTERVAL_SECS", 3600).max(1)),
            deletion_max_attempts: env_or("DELETION_MAX_ATTEMPTS", 3).max(1),
            deletion_retry_base: Duration::from_secs(env_or("DELETION_RETRY_BASE_SECS", 60)),
        })
    }

    pub fn lifecycle_policy(&self) -> LifecyclePolicy {
        LifecyclePolicy { grace_period: self.deletion_grace, max_attempts: self.deletion_max_attempts }
    }
}

// Valor malformado não derruba a aplicação: avisa e usa o padrão
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Valor inválido, usando o padrão");
            default
        }),
        Err(_) => default,
    }
}

// =============================================================================
//  ESTADO COMPARTILHADO
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub settings: Arc<Settings>,
    pub lead_service: LeadService,
    pub appointment_service: AppointmentService,
    pub lifecycle_service: LifecycleService,
}

impl AppState {
    /// Conecta ao banco e monta o grafo de dependências.
    pub async fn new(settings: Settings, clock: SharedClock, queue: DeletionQueue) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Self::with_pool(db_pool, settings, clock, queue)
    }

    /// Monta o estado sobre um pool já aberto (usado também pelos testes).
    pub fn with_pool(
        db_pool: PgPool,
        settings: Settings,
        clock: SharedClock,
        queue: DeletionQueue,
    ) -> anyhow::Result<Self> {
        // --- Repositórios ---
        let contact_repo = ContactRepository::new(db_pool.clone());
        let lead_repo = LeadRepository::new(db_pool.clone());
        let routing_repo = RoutingRepository::new(db_pool.clone());
        let forwarding_repo = ForwardingRepository::new(db_pool.clone());
        let endpoint_repo = EndpointRepository::new(db_pool.clone());
        let deletion_repo = DeletionRepository::new(db_pool.clone());
        let appointment_repo = AppointmentRepository::new(db_pool.clone());

        // --- Serviços ---
        let routing = RoutingService::new(routing_repo.clone());
        let forwarding = ForwardingService::new(
            db_pool.clone(),
            settings.forward_timeout,
            clock.clone(),
            forwarding_repo,
            routing_repo,
            endpoint_repo.clone(),
        )
        .context("Falha ao montar o serviço de encaminhamento")?;

        let lead_service = LeadService::new(
            db_pool.clone(),
            clock.clone(),
            contact_repo,
            lead_repo.clone(),
            endpoint_repo.clone(),
            routing,
            forwarding,
        );
        let appointment_service = AppointmentService::new(
            db_pool.clone(),
            clock.clone(),
            appointment_repo,
            lead_repo,
            endpoint_repo.clone(),
            lead_service.clone(),
        );
        let lifecycle_service = LifecycleService::new(
            db_pool.clone(),
            clock,
            endpoint_repo,
            deletion_repo,
            queue,
            settings.lifecycle_policy(),
        );

        Ok(Self {
            db_pool,
            settings: Arc::new(settings),
            lead_service,
            appointment_service,
            lifecycle_service,
        })
    }
}
