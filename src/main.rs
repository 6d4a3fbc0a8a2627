//! Gatehouse binary entry point

use gatehouse::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Load `.env` (if present)
/// 2. Load configuration from file and environment
/// 3. Initialize tracing/logging
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load .env
    dotenvy::dotenv().ok();

    // 2. Load configuration
    let config = config::AppConfig::load()?;

    // 3. Initialize tracing/logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("gatehouse={},tower_http=debug", config.logging.level).into()
    });

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting Gatehouse...");
    tracing::info!(
        port = config.server.port,
        public_dir = %config.server.public_dir.display(),
        "Configuration loaded"
    );
    if !config.server.public_dir.is_dir() {
        tracing::warn!(
            public_dir = %config.server.public_dir.display(),
            "Static content directory does not exist; landing and dashboard pages will 404"
        );
    }

    gatehouse::metrics::init_metrics();

    // 4. Initialize application state
    let state = AppState::new(config.clone())?;

    // 5. Build Axum router
    let app = gatehouse::build_router(state);

    // 6. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
