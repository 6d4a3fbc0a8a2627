//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse::auth::{MemorySessionStore, Session, SessionHandle, SessionStore, UserProfile};
use gatehouse::error::AppError;
use gatehouse::{AppState, config};
use reqwest::header::{LOCATION, SET_COOKIE};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_REDIRECT_URI: &str = "https://app.example.com/auth/callback";
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";
pub const LANDING_MARKER: &str = "landing page for tests";
pub const DASHBOARD_MARKER: &str = "dashboard for tests";

/// Test server instance
///
/// The identity provider is a `wiremock` server; the static tree lives
/// in a temporary directory.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub provider: MockServer,
    pub _public_dir: TempDir,
    pub client: reqwest::Client,
    memory: Option<Arc<MemorySessionStore>>,
}

impl TestServer {
    /// Create a new test server with the in-process session store
    pub async fn new() -> Self {
        let mut memory = None;
        let mut server = Self::with_store(|config| {
            let store = Arc::new(MemorySessionStore::new(config.session.max_age));
            memory = Some(store.clone());
            store as Arc<dyn SessionStore>
        })
        .await;
        server.memory = memory;
        server
    }

    /// Create a new test server with a custom session backend
    pub async fn with_store<F>(make_store: F) -> Self
    where
        F: FnOnce(&config::AppConfig) -> Arc<dyn SessionStore>,
    {
        gatehouse::metrics::init_metrics();

        let provider = MockServer::start().await;
        let public_dir = create_public_tree();

        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                public_dir: public_dir.path().to_path_buf(),
            },
            oauth: config::OAuthConfig {
                client_id: "test-client-id".to_string(),
                client_secret: "test-client-secret".to_string(),
                redirect_uri: TEST_REDIRECT_URI.to_string(),
                api_base: provider.uri(),
                scopes: "identify email".to_string(),
                timeout_seconds: 1,
            },
            session: config::SessionConfig {
                secret: "test-secret-key-32-bytes-long!!!".to_string(),
                max_age: 86400,
                cookie_name: "sid".to_string(),
            },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        let store = make_store(&config);
        let state = AppState::with_session_store(config, store).unwrap();

        // Redirects are asserted on, never followed
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = gatehouse::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            provider,
            _public_dir: public_dir,
            client,
            memory: None,
        }
    }

    /// Get URL for a path on the server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `path` with an optional session cookie header
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }
        request.send().await.unwrap()
    }

    /// Mount a provider that accepts any code and returns `profile`
    pub async fn mount_provider(&self, profile: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": TEST_ACCESS_TOKEN,
                "token_type": "Bearer",
                "expires_in": 604800,
                "scope": "identify email"
            })))
            .mount(&self.provider)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .and(header("authorization", format!("Bearer {TEST_ACCESS_TOKEN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile))
            .mount(&self.provider)
            .await;
    }

    /// Run the full callback flow and return the `Cookie` header value
    /// for the new session
    pub async fn login(&self) -> String {
        self.mount_provider(test_profile_json()).await;

        let response = self.get("/auth/callback?code=test-code", None).await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/dashboard");

        session_cookie(&response).expect("callback sets session cookie")
    }

    /// Number of sessions in the memory store
    pub async fn session_count(&self) -> u64 {
        self.memory
            .as_ref()
            .expect("server uses the memory store")
            .session_count()
            .await
    }

    /// Mint a session directly in the store, bypassing the provider
    pub async fn create_test_session(&self) -> String {
        let handle = self
            .state
            .sessions
            .create(test_profile())
            .await
            .expect("session is created");
        let value = self.state.cookies.sign(&handle).unwrap();
        format!("{}={}", self.state.cookies.name(), value)
    }
}

/// Profile the mocked provider returns by default
pub fn test_profile() -> UserProfile {
    UserProfile {
        id: "80351110224678912".to_string(),
        username: "nelly".to_string(),
        avatar: Some("8342729096ea3675442027381ff50dfe".to_string()),
    }
}

pub fn test_profile_json() -> serde_json::Value {
    json!({
        "id": "80351110224678912",
        "username": "nelly",
        "discriminator": "0",
        "avatar": "8342729096ea3675442027381ff50dfe",
        "email": "nelly@example.com",
        "verified": true
    })
}

/// `Location` header of a redirect
pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// All raw `Set-Cookie` header values
pub fn set_cookies(response: &reqwest::Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(ToString::to_string))
        .collect()
}

/// `sid=<value>` pair for a non-empty session cookie, if one was set
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    set_cookies(response).into_iter().find_map(|raw| {
        let pair = raw.split(';').next()?.trim().to_string();
        let (name, value) = pair.split_once('=')?;
        (name == "sid" && !value.is_empty()).then_some(pair)
    })
}

fn create_public_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let dashboard = dir.path().join("dashboard");
    std::fs::create_dir_all(dashboard.join("scripts")).unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        format!("<html><body>{LANDING_MARKER}</body></html>"),
    )
    .unwrap();
    std::fs::write(
        dashboard.join("index.html"),
        format!("<html><body>{DASHBOARD_MARKER}</body></html>"),
    )
    .unwrap();
    std::fs::write(dashboard.join("scripts/main.js"), "loadUser();").unwrap();
    std::fs::write(dir.path().join("robots.txt"), "User-agent: *").unwrap();
    dir
}

/// Session backend whose storage cannot be cleared
///
/// Wraps the memory store so logins still work.
pub struct UnclearableStore {
    inner: MemorySessionStore,
}

impl UnclearableStore {
    pub fn new(max_age: i64) -> Self {
        Self {
            inner: MemorySessionStore::new(max_age),
        }
    }
}

#[async_trait]
impl SessionStore for UnclearableStore {
    async fn create(&self, user: UserProfile) -> Result<SessionHandle, AppError> {
        self.inner.create(user).await
    }

    async fn read(&self, handle: &SessionHandle) -> Result<Option<Session>, AppError> {
        self.inner.read(handle).await
    }

    async fn destroy(&self, _handle: &SessionHandle) -> Result<(), AppError> {
        Err(AppError::Logout("session backend unavailable".to_string()))
    }
}
