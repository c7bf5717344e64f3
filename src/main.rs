// src/main.rs

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lead_router::{
    background::{deletion_queue, deletion_queue::DeletionQueue, deletion_sweep},
    common::clock::SystemClock,
    config::{AppState, Settings},
    routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let bind_addr = settings.bind_addr.clone();
    let sweep_interval = settings.deletion_sweep_interval;
    let retry_base = settings.deletion_retry_base;

    let (queue, queue_receiver) = DeletionQueue::channel();
    let app_state = AppState::new(settings, Arc::new(SystemClock), queue).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // --- Tarefas de fundo ---
    let cancel = CancellationToken::new();
    let queue_task = tokio::spawn(deletion_queue::run(
        app_state.lifecycle_service.clone(),
        queue_receiver,
        retry_base,
        cancel.clone(),
    ));
    let sweep_task = tokio::spawn(deletion_sweep::run(
        app_state.lifecycle_service.clone(),
        sweep_interval,
        cancel.clone(),
    ));

    let app = routes::build_router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Falha ao escutar o sinal de desligamento");
            }
            tracing::info!("Sinal de desligamento recebido");
            shutdown.cancel();
        })
        .await?;

    // Servidor drenado: encerra as tarefas de fundo
    cancel.cancel();
    let _ = tokio::join!(queue_task, sweep_task);
    tracing::info!("Servidor encerrado");

    Ok(())
}
