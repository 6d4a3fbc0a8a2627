//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (GATEHOUSE__*, override)
//! 4. Bare deployment variables (CLIENT_ID, CLIENT_SECRET, REDIRECT_URI,
//!    SESSION_SECRET, PORT)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3001)
    pub port: u16,
    /// Root of the static content tree; the dashboard lives in `dashboard/`
    pub public_dir: PathBuf,
}

impl ServerConfig {
    /// Directory holding the protected dashboard files
    pub fn dashboard_dir(&self) -> PathBuf {
        self.public_dir.join("dashboard")
    }

    /// Landing page served to anonymous visitors
    pub fn landing_page(&self) -> PathBuf {
        self.public_dir.join("index.html")
    }
}

/// Identity provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Callback URL registered with the provider
    pub redirect_uri: String,
    /// Provider API root (e.g., "https://discord.com/api/v10")
    pub api_base: String,
    /// Space separated scope list
    pub scopes: String,
    /// Timeout applied to each outbound provider call
    pub timeout_seconds: u64,
}

impl OAuthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie signing secret (32+ bytes)
    pub secret: String,
    /// Session lifetime in seconds (default: 86400 = 1 day)
    pub max_age: i64,
    /// Cookie name
    pub cookie_name: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

/// Variables the original deployment set without a prefix
const BARE_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("CLIENT_ID", "oauth.client_id"),
    ("CLIENT_SECRET", "oauth.client_secret"),
    ("REDIRECT_URI", "oauth.redirect_uri"),
    ("SESSION_SECRET", "session.secret"),
    ("PORT", "server.port"),
];

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (GATEHOUSE__*)
    /// 5. Bare deployment variables (CLIENT_ID, ..., PORT)
    ///
    /// # Errors
    /// Returns error if configuration is missing or invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let mut builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            .set_default("server.public_dir", "public")?
            .set_default("oauth.api_base", "https://discord.com/api/v10")?
            .set_default("oauth.scopes", "identify email")?
            .set_default("oauth.timeout_seconds", 10)?
            .set_default("session.max_age", 86400)?
            .set_default("session.cookie_name", "sid")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("GATEHOUSE")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in BARE_ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let app_config: Self = builder
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;
        const MIN_SESSION_SECRET_BYTES: usize = 32;

        if self.session.secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(AppError::Config(format!(
                "session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            )));
        }

        if self.session.max_age <= 0 {
            return Err(AppError::Config(
                "session.max_age must be greater than 0".to_string(),
            ));
        }

        if self.oauth.client_id.trim().is_empty() {
            return Err(AppError::Config("oauth.client_id must be set".to_string()));
        }

        if self.oauth.timeout_seconds == 0 {
            return Err(AppError::Config(
                "oauth.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        url::Url::parse(&self.oauth.redirect_uri).map_err(|e| {
            AppError::Config(format!("oauth.redirect_uri is not a valid URL: {e}"))
        })?;
        url::Url::parse(&self.oauth.api_base)
            .map_err(|e| AppError::Config(format!("oauth.api_base is not a valid URL: {e}")))?;

        Ok(())
    }
}
