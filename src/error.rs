//! Error types for Gatehouse
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Browser-facing failures render as plain text; authentication
//! failures are not errors to the user and render as a redirect.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

/// Application-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// No valid session on a protected route (redirect to `/`)
    #[error("Authentication required")]
    Unauthenticated,

    /// Provider redirected back without an authorization code (redirect to `/`)
    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    /// Provider did not hand out an access token (500)
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Provider profile request failed (500)
    #[error("Profile fetch failed: {0}")]
    ProfileFetch(String),

    /// Session could not be destroyed (500, retryable)
    #[error("Logout failed: {0}")]
    Logout(String),

    /// Session backend error outside of logout (500)
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing error (500)
    #[error("Signing error: {0}")]
    Signing(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// Label used for the `error_type` metric dimension
    fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthenticated => "unauthenticated",
            AppError::MissingAuthorizationCode => "missing_code",
            AppError::TokenExchange(_) => "token_exchange",
            AppError::ProfileFetch(_) => "profile_fetch",
            AppError::Logout(_) => "logout",
            AppError::SessionStore(_) => "session_store",
            AppError::Config(_) => "config",
            AppError::Signing(_) => "signing",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Details of provider failures stay in the server log; the
    /// browser only sees a short, fixed message.
    fn into_response(self) -> Response {
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.kind()]).inc();

        let (status, message) = match &self {
            AppError::Unauthenticated | AppError::MissingAuthorizationCode => {
                return Redirect::to("/").into_response();
            }
            AppError::TokenExchange(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication Error: Failed to get access token from the identity provider. \
                 Check your Client Secret and Redirect URI.",
            ),
            AppError::ProfileFetch(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred during authentication. Check server logs.",
            ),
            AppError::Logout(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Could not log out."),
            AppError::SessionStore(_)
            | AppError::Config(_)
            | AppError::Signing(_)
            | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
