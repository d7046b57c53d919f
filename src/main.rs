//! `HealthBot` - patient health education chat service
//!
//! A Rust backend that researches a health topic on trusted sites, summarizes
//! it with citations, and checks understanding with a one-question quiz.

mod api;
mod config;
mod db;
mod llm;
mod prompts;
mod runtime;
mod search;
mod state_machine;

use api::{create_router, AppState};
use config::{AppConfig, RETENTION_DAYS};
use db::Database;
use llm::{LlmService, LoggingService, OpenAIService, UnavailableLlm};
use runtime::{DatabaseStorage, LlmGenerationClient, ProductionEngine, ProviderSearchClient};
use search::{SearchService, TavilyService, UnavailableSearch};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthbot=info,tower_http=info".into()),
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

    let cutoff = chrono::Utc::now() - chrono::Duration::days(RETENTION_DAYS);
    let purged = db.purge_older_than(cutoff)?;
    tracing::info!(
        checkpoints = purged.checkpoints,
        messages = purged.messages,
        retention_days = RETENTION_DAYS,
        "Purged expired sessions"
    );

    // Collaborators. A missing credential degrades to fallback content
    // instead of refusing to start.
    let llm: Arc<dyn LlmService> = match &config.openai_api_key {
        Some(key) => Arc::new(OpenAIService::new(
            key.clone(),
            config.openai_model.clone(),
            &config.openai_base_url,
        )?),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; summaries and questions will use fallback content");
            Arc::new(UnavailableLlm)
        }
    };
    let generation = LlmGenerationClient::new(
        Arc::new(LoggingService::new(llm)),
        config.openai_api_key.is_some(),
    );

    let search_service: Arc<dyn SearchService> = match &config.tavily_api_key {
        Some(key) => Arc::new(TavilyService::new(key.clone())?),
        None => {
            tracing::warn!("TAVILY_API_KEY not set; searches will use the fallback source");
            Arc::new(UnavailableSearch)
        }
    };
    let search = ProviderSearchClient::new(search_service, config.tavily_api_key.is_some());

    let storage = DatabaseStorage::new(db);
    let engine: ProductionEngine =
        ProductionEngine::new(storage.clone(), generation, search, config.engine);
    tracing::info!(
        model = %config.openai_model,
        max_steps = config.engine.max_steps,
        mismatch_policy = ?config.engine.mismatch_policy,
        call_timeout_secs = config.engine.call_timeout.as_secs(),
        "Workflow engine initialized"
    );

    let state = AppState::new(Arc::new(engine), Arc::new(storage));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true).deflate(true).zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("HealthBot server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
