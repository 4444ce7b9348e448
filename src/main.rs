use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use homeserve::config::AppConfig;
use homeserve::db;
use homeserve::handlers;
use homeserve::models::ServiceCatalog;
use homeserve::services::ai::groq::GroqProvider;
use homeserve::services::ai::ollama::OllamaProvider;
use homeserve::services::ai::router::LlmSmartRouter;
use homeserve::services::ai::LlmProvider;
use homeserve::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let catalog = ServiceCatalog::load(config.catalog_path.as_deref())?;
    tracing::info!(services = catalog.services.len(), "service catalog loaded");

    let llm: Box<dyn LlmProvider> = match config.llm_provider.as_str() {
        "groq" => {
            anyhow::ensure!(!config.groq_api_key.is_empty(), "GROQ_API_KEY must be set when LLM_PROVIDER=groq");
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Box::new(GroqProvider::new(config.groq_api_key.clone(), config.groq_model.clone()))
        }
        _ => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Box::new(OllamaProvider::new(config.ollama_url.clone(), config.ollama_model.clone()))
        }
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        catalog,
        router: Box::new(LlmSmartRouter::new(llm)),
    });

    let app = handlers::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
