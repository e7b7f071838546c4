//! crypto-query HTTP Server
//!
//! Axum-based server exposing the query pipeline: a natural-language
//! question in, fetched data plus a written analysis out.

mod config;
mod handlers;
mod state;

use std::sync::Arc;

use axum::{routing::{get, post}, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use market_data::{register_all, DataConfig, DataSources};
use query_core::{Bindings, CapabilityRegistry, CompilerConfig, PipelineConfig, QueryPipeline};
use query_runtime::{build_router, RuntimeConfig};

use crate::config::ServerConfig;
use crate::handlers::{analyze_handler, health_check};
use crate::state::AppState;

/// Routes plus the CORS and tracing layers
fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let server = ServerConfig::from_env();

    // Model routes
    let router = build_router(&RuntimeConfig::from_env())?;
    for routed in router.routes() {
        match routed.provider.health_check().await {
            Ok(true) => tracing::info!("✓ Model route {} ({})", routed.route.id, routed.route.model),
            Ok(false) | Err(_) => {
                tracing::warn!("⚠ Model route {} not reachable at {}", routed.route.id, routed.route.endpoint);
            }
        }
    }
    tracing::info!("Default model: {}", router.default_route());

    // Data sources and capabilities
    let sources = DataSources::from_config(&DataConfig::from_env())?;
    let mut registry = CapabilityRegistry::new();
    register_all(&mut registry, &sources);
    tracing::info!("Registered {} capabilities", registry.len());

    let bindings = Bindings::standard(&sources.portfolio_addresses);

    let pipeline = QueryPipeline::new(
        Arc::new(router),
        Arc::new(registry),
        Arc::new(bindings),
        PipelineConfig {
            sandbox: server.sandbox,
            compiler: CompilerConfig::default(),
        },
    );
    tracing::info!(
        "Sandbox budget: {} calls, {}s",
        server.sandbox.max_calls,
        server.sandbox.timeout.as_secs()
    );

    let app = app(AppState::new(pipeline));

    // Start server
    let listener = tokio::net::TcpListener::bind(&server.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 crypto-query server running on http://{}", server.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health   - Health check and model routes");
    tracing::info!("  POST /analyze  - Answer a crypto question");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
