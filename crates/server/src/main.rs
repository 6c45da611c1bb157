mod handlers;
mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use aggregator_contracts::config::Config;
use aggregator_model_client::RemoteModelClient;
use aggregator_research::TavilySearchClient;

use state::AppState;

const UPSTREAM_BASE_URL: &str = "https://openrouter.ai/api/v1";
const SEARCH_ENDPOINT: &str = "https://api.tavily.com/search";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    aggregator_observability::init_logging();

    let config_path = std::env::var("AGGREGATOR_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_from_file(&config_path).unwrap_or_default().with_env_overrides();

    let api_key = Config::gateway_api_key().ok_or_else(|| anyhow::anyhow!("OPENROUTER_API_KEY is required"))?;
    let gateway = Arc::new(RemoteModelClient::new(api_key, UPSTREAM_BASE_URL)?);

    let search_provider: Option<Arc<dyn aggregator_research::SearchProvider>> = if Config::has_search_credentials() {
        let tavily_key = std::env::var("TAVILY_API_KEY").expect("checked by has_search_credentials");
        let http_client = reqwest::Client::new();
        Some(Arc::new(TavilySearchClient::new(http_client, SEARCH_ENDPOINT, tavily_key)))
    } else {
        tracing::warn!("TAVILY_API_KEY not set, deep research will run without external sources");
        None
    };

    let state = AppState::new(config, gateway, search_provider);

    let shutdown_rx = state.shutdown_tx.subscribe();
    tokio::spawn(state.worker.clone().run(shutdown_rx));

    let frontend_origin = std::env::var("FRONTEND_ORIGIN").ok();
    let cors = match frontend_origin {
        Some(origin) => CorsLayer::new().allow_origin(origin.parse::<axum::http::HeaderValue>()?),
        None => CorsLayer::new().allow_origin(AllowOrigin::any()),
    };

    let app = Router::new()
        .route("/api/v1/query", post(handlers::query))
        .route("/api/v1/generate-image", post(handlers::generate_image))
        .route("/api/v1/deep-research", post(handlers::deep_research))
        .route("/api/v1/deep-research/:job_id", get(handlers::get_deep_research_job))
        .route("/healthz", get(handlers::health))
        .layer(cors)
        .with_state(state.clone());

    let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "aggregator-server listening");

    let shutdown_tx = state.shutdown_tx.clone();
    let graceful = async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, app).with_graceful_shutdown(graceful).await?;

    Ok(())
}
