//! OAuth authentication
//!
//! Handles:
//! - Identity provider client (token exchange, profile fetch)
//! - OAuth login flow routes
//! - Session storage and the signed session cookie
//! - Authentication middleware

pub mod client;
pub mod cookie;
mod middleware;
mod oauth;
pub mod session;

pub use client::{AccessToken, OAuthClient, build_authorization_url};
pub use cookie::SessionCookies;
pub use middleware::{CurrentUser, MaybeUser, require_auth};
pub use oauth::auth_router;
pub use session::{MemorySessionStore, Session, SessionHandle, SessionStore, UserProfile};
