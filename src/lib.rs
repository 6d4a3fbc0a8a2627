//! Gatehouse - an OAuth2 login gateway in front of a dashboard
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Router (Axum)                           │
//! │  - /, /login, /auth/callback, /logout                       │
//! │  - /dashboard, /user-data (behind require_auth)             │
//! │  - static files, /health, /metrics                          │
//! └─────────────────────────────────────────────────────────────┘
//!                │                              │
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │   OAuth client (reqwest)     │ │  Session store (trait)     │
//! │  - code -> token -> profile  │ │  - create / read / destroy │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: page handlers and metrics endpoint
//! - `auth`: provider client, login flow, sessions, middleware
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Identity provider client
    pub oauth: Arc<auth::OAuthClient>,

    /// Session backend
    pub sessions: Arc<dyn auth::SessionStore>,

    /// Session cookie signer
    pub cookies: Arc<auth::SessionCookies>,
}

impl AppState {
    /// Initialize application state with the in-process session store
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let store = auth::MemorySessionStore::new(config.session.max_age);
        Self::with_session_store(config, Arc::new(store))
    }

    /// Initialize application state with an explicit session backend
    pub fn with_session_store(
        config: config::AppConfig,
        sessions: Arc<dyn auth::SessionStore>,
    ) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let oauth = auth::OAuthClient::new(config.oauth.clone())?;
        let cookies = auth::SessionCookies::new(&config.session);

        tracing::info!(
            api_base = %config.oauth.api_base,
            redirect_uri = %config.oauth.redirect_uri,
            session_max_age = config.session.max_age,
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            oauth: Arc::new(oauth),
            sessions,
            cookies: Arc::new(cookies),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, trace::TraceLayer};

    let cors_layer = build_cors_layer(&state.config.oauth);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::landing_router())
        .merge(auth::auth_router())
        .merge(api::protected_router(state.clone()))
        .fallback(api::public_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

/// Allow cross-origin requests only from the origin the provider
/// redirects back to.
fn build_cors_layer(oauth: &config::OAuthConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    let origin = url::Url::parse(&oauth.redirect_uri)
        .map(|url| url.origin().ascii_serialization())
        .ok()
        .and_then(|origin| HeaderValue::from_str(&origin).ok());

    match origin {
        Some(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        None => {
            tracing::error!(
                redirect_uri = %oauth.redirect_uri,
                "Failed to derive CORS origin from redirect URI; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
