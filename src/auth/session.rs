//! Session management
//!
//! Sessions live server-side behind the [`SessionStore`] capability.
//! The browser only holds an opaque handle (see [`super::cookie`]).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use prometheus::IntGauge;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// User profile snapshot taken at login
///
/// Serialized as-is for `/user-data`, so the field names are part of the
/// browser contract: `{id, username, avatar}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Provider user ID
    pub id: String,
    /// Provider display name
    pub username: String,
    /// Avatar hash, absent when the user has the default avatar
    pub avatar: Option<String>,
}

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Generate a fresh random handle (256 bits, URL-safe)
    pub fn generate() -> Self {
        use base64::{Engine as _, engine::general_purpose};
        use rand::RngCore;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Logged-in state held by the store
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: SessionHandle,
    pub user: UserProfile,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Storage backend for sessions
///
/// Route logic only talks to this trait, so a shared backend can replace
/// the in-process one without touching handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session for `user` and return its handle
    async fn create(&self, user: UserProfile) -> Result<SessionHandle, AppError>;

    /// Look up a live session; expired or unknown handles yield `None`
    async fn read(&self, handle: &SessionHandle) -> Result<Option<Session>, AppError>;

    /// Invalidate a session. Unknown handles are not an error.
    async fn destroy(&self, handle: &SessionHandle) -> Result<(), AppError>;
}

/// In-process session store
///
/// Volatile, cleared on restart. Entries expire after the configured
/// lifetime even if never read again.
pub struct MemorySessionStore {
    sessions: Cache<String, Arc<Session>>,
    ttl: chrono::Duration,
    live: IntGauge,
}

impl MemorySessionStore {
    /// Create new store
    ///
    /// # Arguments
    /// * `max_age_secs` - Fixed lifetime of every session, from creation
    pub fn new(max_age_secs: i64) -> Self {
        Self::with_gauge(max_age_secs, crate::metrics::SESSIONS_ACTIVE.clone())
    }

    fn with_gauge(max_age_secs: i64, live: IntGauge) -> Self {
        let ttl_secs = max_age_secs.max(1) as u64;
        let sessions = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self {
            sessions,
            ttl: chrono::Duration::seconds(ttl_secs as i64),
            live,
        }
    }

    /// Number of live sessions currently held
    pub async fn session_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    /// Refresh the live-session gauge; TTL evictions only show up here
    async fn update_gauge(&self) {
        self.live.set(self.session_count().await as i64);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user: UserProfile) -> Result<SessionHandle, AppError> {
        let handle = SessionHandle::generate();
        let now = Utc::now();
        let session = Session {
            handle: handle.clone(),
            user,
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.sessions
            .insert(handle.as_str().to_owned(), Arc::new(session))
            .await;
        self.update_gauge().await;

        Ok(handle)
    }

    async fn read(&self, handle: &SessionHandle) -> Result<Option<Session>, AppError> {
        let session = self
            .sessions
            .get(handle.as_str())
            .await
            .filter(|session| !session.is_expired())
            .map(|session| Session::clone(&session));
        self.update_gauge().await;
        Ok(session)
    }

    async fn destroy(&self, handle: &SessionHandle) -> Result<(), AppError> {
        self.sessions.invalidate(handle.as_str()).await;
        self.update_gauge().await;
        Ok(())
    }
}
