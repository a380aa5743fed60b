//! Server wiring and runtime

pub mod config;

use crate::speech::{self, SpeechService};
use crate::websocket;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{routing::get, Extension, Router};
use config::AppConfig;
use salon_core::{PresetTable, RoomLoader, RoomRegistry};
use salon_llm::{
    HttpRetrievalStore, InferenceProvider, OllamaConfig, OllamaProvider, RetrievalStore,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared per-process state handed to every connection
pub struct AppState {
    pub registry: RoomRegistry,
    pub speech: Arc<dyn SpeechService>,
}

/// Store used when retrieval is not configured: every collection is
/// absent, so collection-backed agents load as inactive librarians.
struct DisabledRetrieval;

#[async_trait]
impl RetrievalStore for DisabledRetrieval {
    async fn collection_exists(&self, _name: &str) -> salon_llm::Result<bool> {
        Ok(false)
    }
}

/// Load configuration and run the server until shutdown
pub async fn run(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    serve(config).await
}

/// Run the server with the given configuration
pub async fn serve(config: AppConfig) -> Result<()> {
    let provider: Arc<dyn InferenceProvider> = Arc::new(OllamaProvider::new(OllamaConfig {
        base_url: config.inference.base_url.clone(),
        model: config.inference.model.clone(),
        timeout_ms: config.inference.timeout_ms,
    })?);
    info!(
        provider = provider.name(),
        model = provider.default_model(),
        "Inference provider ready"
    );

    let store: Box<dyn RetrievalStore> = if config.retrieval.enabled {
        Box::new(HttpRetrievalStore::new(
            config.retrieval.base_url.clone(),
            config.retrieval.timeout_ms,
        )?)
    } else {
        Box::new(DisabledRetrieval)
    };

    let loader = RoomLoader::with_path(&config.rooms.dir);
    let registry = RoomRegistry::load(
        &loader,
        provider,
        Arc::new(PresetTable::standard()),
        store.as_ref(),
    )
    .await?;

    let state = Arc::new(AppState {
        registry,
        speech: speech::from_config(&config.speech),
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket::ws_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid listen address")?;
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")
}

async fn health() -> &'static str {
    "ok"
}
