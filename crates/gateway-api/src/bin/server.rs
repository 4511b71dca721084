//! Entrypoint (spec §10.6): load config, bootstrap collaborators, serve
//! until `ctrl_c`/`SIGTERM`, then drive the work queue through a bounded
//! graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use gateway_api::blob::BlobStoreKind;
use gateway_api::state::AppState;
use gateway_catalogue::{ModelCatalogue, ModelSourceKind};
use gateway_llm::LlmAdapter;
use gateway_orchestration::{OrchestrationContext, WorkQueue};
use gateway_selector::ScoringClientKind;
use gateway_shared::config::AppConfig;
use gateway_shared::event::EventBus;
use gateway_shared::logging::init_tracing;
use gateway_store::{ApiKeyStore, ChatStore, FileStore, TaskStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(config.logging.format);

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    gateway_store::MIGRATOR.run(&pool).await?;

    let catalogue = Arc::new(ModelCatalogue::new(ModelSourceKind::open_router(&config.llm.base_url), config.catalogue.ttl()));
    let scoring = Arc::new(ScoringClientKind::http(&config.scoring.base_url));
    let llm = Arc::new(LlmAdapter::new(catalogue.clone(), config.llm.base_url.clone()));
    let events = Arc::new(EventBus::new());
    let store = Arc::new(TaskStore::new(pool.clone()));
    let files = Arc::new(FileStore::new(pool.clone()));
    let api_keys = Arc::new(ApiKeyStore::new(pool.clone()));
    let chat = Arc::new(ChatStore::new(pool.clone()));
    let blobs = Arc::new(BlobStoreKind::local_disk(config.storage.blob_root.clone()));

    let orchestration =
        OrchestrationContext::new(store, files, llm, catalogue, scoring, events, config.llm.decomposition_model.clone());
    let (queue, queue_handle) = WorkQueue::start(orchestration.clone());

    let state = AppState { orchestration, queue: queue.clone(), api_keys, chat, blobs };
    let app = gateway_api::build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!(addr = %config.server.bind_addr, "listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    server.await?;

    tracing::info!("draining work queue");
    let timeout = Duration::from_millis(config.server.shutdown_timeout_ms);
    if tokio::time::timeout(timeout, queue.stop()).await.is_err() {
        tracing::warn!("work queue did not stop within the shutdown timeout");
    }
    queue_handle.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { tracing::info!("received Ctrl+C") }
        _ = terminate => { tracing::info!("received SIGTERM") }
    }
}
