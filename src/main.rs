use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agent::config::{models, AppConfig};
use agent::services::embedding::OpenAiEmbedder;
use agent::services::registry::ModelRegistry;
use agent::{db, routes, AppState};
use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// M-MIMALLOC-APP: Use mimalloc as global allocator for improved performance.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration (DATABASE_URL): {e}"))?;

    let pool = db::create_pool(&config.database_url, config.database_max_connections).await?;
    db::migrate(&pool).await?;
    tracing::info!("Database migrations applied");

    // Provider calls may stream for minutes, so only the connect phase is bounded.
    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let definitions = models::load_models(&config.config_path)?;
    let registry = ModelRegistry::from_definitions(&definitions, http.clone());
    tracing::info!(
        models = registry.catalogue().len(),
        config_path = %config.config_path.display(),
        "Model registry ready"
    );

    let embedder = OpenAiEmbedder::new(http, &config.embedding);

    let host: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));

    let state = AppState {
        db: pool,
        config,
        registry: Arc::new(registry),
        embedder: Arc::new(embedder),
    };
    let app = routes::router(state);

    tracing::info!(host = %addr, "Starting agent API server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
