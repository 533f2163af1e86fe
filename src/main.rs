mod agent;
mod config;
mod db;
mod errors;
mod models;
mod routes;
mod service;
mod stream;

use std::sync::Arc;

use tracing::info;

use crate::agent::OllamaGenerateClient;
use crate::config::AppConfig;
use crate::db::conversation_repository::JsonFileRepository;
use crate::service::chat_service::ChatService;
use crate::service::conversation_store::{ConversationStore, SharedStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "local_chat=debug,tower_http=debug".into()),
        )
        .init();

    let config = AppConfig::from_env();

    // ── Conversation history ──────────────────────────────────────────────────
    let repository = Arc::new(JsonFileRepository::new(&config.storage_dir));
    info!("Conversation history slot: {}", repository.path().display());
    let store = SharedStore::new(ConversationStore::load(repository.as_ref()), repository);

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let agent = OllamaGenerateClient::new(&config.ollama_base_url, &config.model)?;
    info!(
        "Generating with model '{}' via {}",
        config.model,
        agent.endpoint()
    );
    let chat_service = ChatService::new(store, agent, config.frame_interval);

    // ── Router ────────────────────────────────────────────────────────────────
    let app = routes::router(chat_service);

    // ── Listen ────────────────────────────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{addr}/");

    axum::serve(listener, app).await?;
    Ok(())
}
