//! OAuth login flow
//!
//! Implements the browser-facing half of the OAuth 2.0 authorization
//! code flow: send the visitor to the provider, take the code it hands
//! back, and turn it into a session.

use axum::{
    Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
};
use axum_extra::extract::CookieJar;

use super::middleware::MaybeUser;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::{LOGINS_TOTAL, LOGOUTS_TOTAL};

/// Create authentication router
///
/// Routes:
/// - GET /login - Redirect to provider (or dashboard when logged in)
/// - GET /auth/callback - OAuth callback
/// - GET /auth/discord/callback - OAuth callback (legacy registration)
/// - GET|POST /logout - Logout
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/auth/callback", get(oauth_callback))
        .route("/auth/discord/callback", get(oauth_callback))
        .route("/logout", get(logout).post(logout))
}

// =============================================================================
// Login
// =============================================================================

/// GET /login
///
/// Logged-in visitors go straight to the dashboard; everyone else is
/// redirected to the provider's consent page.
async fn login(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Redirect, AppError> {
    if user.is_some() {
        return Ok(Redirect::to("/dashboard"));
    }

    let url = state.oauth.authorization_url()?;
    Ok(Redirect::to(url.as_str()))
}

// =============================================================================
// Callback
// =============================================================================

/// Query parameters from the provider callback
///
/// The provider sends `error` instead of `code` when the user declines.
/// Repeated parameters keep their first value.
#[derive(Debug, Default)]
struct CallbackQuery {
    /// Authorization code
    code: Option<String>,
    error: Option<String>,
}

impl CallbackQuery {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "code" if query.code.is_none() => query.code = Some(value),
                "error" if query.error.is_none() => query.error = Some(value),
                _ => {}
            }
        }
        query
    }
}

/// GET /auth/callback
///
/// # Steps
/// 1. Require an authorization code (none: back to `/`, no outbound call)
/// 2. Exchange code for access token
/// 3. Fetch user profile with the token
/// 4. Create session and set cookie
/// 5. Redirect to dashboard
///
/// The session is written only after both provider calls succeed.
async fn oauth_callback(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let query = CallbackQuery::from_pairs(pairs);
    let result = complete_login(&state, query, jar).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::MissingAuthorizationCode) => "missing_code",
        Err(AppError::TokenExchange(_)) => "token_exchange_failed",
        Err(AppError::ProfileFetch(_)) => "profile_fetch_failed",
        Err(_) => "error",
    };
    LOGINS_TOTAL.with_label_values(&[outcome]).inc();

    result
}

async fn complete_login(
    state: &AppState,
    query: CallbackQuery,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AppError> {
    let code = match query.code.filter(|code| !code.is_empty()) {
        Some(code) => code,
        None => {
            if let Some(error) = query.error {
                tracing::info!(%error, "Provider returned without an authorization code");
            }
            return Err(AppError::MissingAuthorizationCode);
        }
    };

    let token = state.oauth.exchange_code_for_token(&code).await?;
    let profile = state.oauth.fetch_profile(&token).await?;
    drop(token);

    let handle = state.sessions.create(profile.clone()).await?;
    let cookie = state.cookies.issue(&handle)?;

    tracing::info!(user_id = %profile.id, username = %profile.username, "User logged in");

    Ok((jar.add(cookie), Redirect::to("/dashboard")))
}

// =============================================================================
// Logout
// =============================================================================

/// GET|POST /logout
///
/// Destroys the session and clears the cookie. Calling it without a
/// session (or twice) is fine.
async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(handle) = state.cookies.handle_from_jar(&jar) {
        if let Err(error) = state.sessions.destroy(&handle).await {
            LOGOUTS_TOTAL.with_label_values(&["failed"]).inc();
            tracing::error!(%error, "Logout error");
            return Err(match error {
                AppError::Logout(msg) => AppError::Logout(msg),
                other => AppError::Logout(other.to_string()),
            });
        }
    }

    LOGOUTS_TOTAL.with_label_values(&["success"]).inc();
    Ok((jar.add(state.cookies.removal()), Redirect::to("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn callback_query_keeps_first_code() {
        let query = CallbackQuery::from_pairs(pairs(&[("code", "a"), ("code", "b")]));
        assert_eq!(query.code.as_deref(), Some("a"));
        assert!(query.error.is_none());
    }

    #[test]
    fn callback_query_reads_provider_error() {
        let query = CallbackQuery::from_pairs(pairs(&[
            ("error", "access_denied"),
            ("state", "ignored"),
        ]));
        assert!(query.code.is_none());
        assert_eq!(query.error.as_deref(), Some("access_denied"));
    }
}
