//! Page routes
//!
//! - / (public landing page)
//! - /dashboard (protected static tree)
//! - /user-data (protected JSON for the dashboard script)
//! - everything else: public static files, minus the dashboard tree

use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::AppState;
use crate::auth::{CurrentUser, MaybeUser, UserProfile, require_auth};
use crate::error::AppError;
use crate::metrics::GATE_DECISIONS_TOTAL;

/// Directory under the public root that only the protected router serves
const DASHBOARD_SEGMENT: &str = "dashboard";

/// Create the public landing router
///
/// Routes:
/// - GET /
pub fn landing_router() -> Router<AppState> {
    Router::new().route("/", get(landing))
}

/// Create the protected router
///
/// Every route here sits behind [`require_auth`].
///
/// Routes:
/// - GET /dashboard, /dashboard/* (static files)
/// - GET /user-data
pub fn protected_router(state: AppState) -> Router<AppState> {
    let dashboard = ServeDir::new(state.config.server.dashboard_dir());

    Router::new()
        .route("/user-data", get(user_data))
        .nest_service("/dashboard", dashboard)
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// GET /
///
/// Logged in: go to the dashboard. Otherwise serve the landing page.
async fn landing(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    request: Request,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    match ServeFile::new(state.config.server.landing_page())
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Fallback: static files from the public directory
///
/// Requests the router could not match still reach the filesystem here,
/// and `ServeDir` decodes percent escapes and collapses empty segments
/// before resolving them. Anything that resolves into the dashboard tree
/// is refused so the gate cannot be sidestepped by respelling the path.
pub async fn public_files(State(state): State<AppState>, request: Request) -> Response {
    if resolves_into_dashboard(request.uri().path()) {
        GATE_DECISIONS_TOTAL.with_label_values(&["redirect"]).inc();
        tracing::debug!(path = %request.uri().path(), "Dashboard path outside the gate; redirecting");
        return AppError::Unauthenticated.into_response();
    }

    match ServeDir::new(&state.config.server.public_dir)
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

/// Whether a raw request path lands inside the dashboard directory once
/// percent-decoded and normalized. Undecodable paths count as inside.
fn resolves_into_dashboard(raw_path: &str) -> bool {
    let Ok(decoded) = urlencoding::decode(raw_path) else {
        return true;
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments
        .first()
        .is_some_and(|first| first.eq_ignore_ascii_case(DASHBOARD_SEGMENT))
}

/// GET /user-data
///
/// Returns the profile snapshot captured at login: `{id, username, avatar}`.
async fn user_data(CurrentUser(session): CurrentUser) -> Json<UserProfile> {
    Json(session.user)
}
