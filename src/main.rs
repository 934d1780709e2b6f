//! Discovery Tree - an endlessly branching concept explorer
//!
//! Users start from a handful of root concepts and descend a tree whose
//! children are generated once by an LLM and cached for everyone after.

mod api;
mod config;
mod db;
mod generator;
mod llm;
mod navigation;
mod session;
mod store;
mod tree;

#[cfg(test)]
mod testing;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use generator::{ContentGenerator, LlmGenerator};
use llm::{ModelRegistry, RegistryService};
use session::SessionController;
use std::net::SocketAddr;
use std::sync::Arc;
use store::DatabaseStorage;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tree::TreeCache;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discovery_tree=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;
    tracing::info!(nodes = db.count_nodes()?, "Database ready");

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));
    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!(
            "No LLM API keys configured. Set ANTHROPIC_API_KEY, OPENAI_API_KEY or LLM_GATEWAY."
        );
    }

    let oracle = RegistryService::new(
        llm_registry.clone(),
        llm_registry.default_model_id().to_string(),
    );
    let generator: Arc<dyn ContentGenerator> =
        Arc::new(LlmGenerator::new(oracle, config.generation_mode));
    tracing::info!(
        mode = %config.generation_mode,
        seeds = ?config.root_seeds,
        "Content generator ready"
    );

    let tree = TreeCache::new(DatabaseStorage::new(db), generator)
        .with_root_seeds(config.root_seeds.clone());
    let state = AppState::new(SessionController::new(tree), llm_registry);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Discovery tree server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGTERM or SIGINT
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigterm), Ok(mut sigint)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) else {
        tracing::error!("Failed to install signal handlers; running until killed");
        std::future::pending::<()>().await;
        return;
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        _ = sigint.recv() => tracing::info!("Received SIGINT, shutting down"),
    }
}
