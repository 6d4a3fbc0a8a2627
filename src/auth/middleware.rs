//! Authentication middleware
//!
//! Protects routes that require a logged-in session. Anything without a
//! live session is sent back to `/`.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use super::session::Session;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::GATE_DECISIONS_TOTAL;

/// Resolve the session referenced by the request's cookie, if any
///
/// A cookie that fails signature verification, names an unknown handle,
/// or points at an expired session all read as "not logged in".
async fn resolve_session(jar: &CookieJar, state: &AppState) -> Result<Option<Session>, AppError> {
    let Some(handle) = state.cookies.handle_from_jar(jar) else {
        return Ok(None);
    };

    state.sessions.read(&handle).await
}

/// Middleware to require authentication
///
/// Adds `Session` to request extensions if valid; otherwise redirects
/// to `/`.
///
/// # Usage
/// ```ignore
/// let protected_routes = Router::new()
///     .route("/user-data", ...)
///     .route_layer(middleware::from_fn_with_state(state, require_auth));
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(session) = resolve_session(&jar, &state).await? else {
        GATE_DECISIONS_TOTAL.with_label_values(&["redirect"]).inc();
        tracing::debug!(path = %request.uri().path(), "No session; redirecting to landing page");
        return Err(AppError::Unauthenticated);
    };

    GATE_DECISIONS_TOTAL.with_label_values(&["allow"]).inc();
    request.extensions_mut().insert(session);

    Ok(next.run(request).await)
}

/// Extractor for current authenticated user
///
/// Reuses the session attached by [`require_auth`] when present.
///
/// # Usage
/// ```ignore
/// async fn handler(
///     CurrentUser(session): CurrentUser,
/// ) -> impl IntoResponse {
///     format!("Hello, {}", session.user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(CurrentUser(session));
        }

        let state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let session = resolve_session(&jar, &state)
            .await?
            .ok_or(AppError::Unauthenticated)?;
        parts.extensions.insert(session.clone());

        Ok(CurrentUser(session))
    }
}

/// Optional current user extractor
///
/// Returns None if not authenticated, instead of error. Store failures
/// are logged and read as anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(MaybeUser(Some(session)));
        }

        let app_state = AppState::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let session = match resolve_session(&jar, &app_state).await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, "Session lookup failed; treating request as anonymous");
                None
            }
        };

        if let Some(session) = &session {
            parts.extensions.insert(session.clone());
        }

        Ok(MaybeUser(session))
    }
}
