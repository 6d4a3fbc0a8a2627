//! Identity provider client
//!
//! Implements the two outbound steps of the OAuth 2.0 authorization code
//! flow: code -> access token, then access token -> profile. No retries;
//! every call is bounded by the configured timeout.

use std::fmt;
use std::time::Instant;

use serde::Deserialize;
use url::Url;

use super::session::UserProfile;
use crate::config::OAuthConfig;
use crate::error::AppError;
use crate::metrics::{PROVIDER_REQUESTS_TOTAL, PROVIDER_REQUEST_DURATION_SECONDS};

/// Bearer credential returned by the token endpoint
///
/// Lives only for the duration of the callback request. `Debug` is
/// redacted so it cannot leak into logs.
pub struct AccessToken(String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Provider `/users/@me` response (fields we keep)
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    username: String,
    avatar: Option<String>,
}

impl From<ProviderUser> for UserProfile {
    fn from(user: ProviderUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            avatar: user.avatar,
        }
    }
}

/// Build the provider authorization URL
///
/// Deterministic; the redirect URI and scope list are percent-encoded.
///
/// # Errors
/// Returns error if `api_base` is not a valid base URL
pub fn build_authorization_url(
    api_base: &str,
    client_id: &str,
    redirect_uri: &str,
    scopes: &str,
) -> Result<Url, AppError> {
    let raw = format!(
        "{}/oauth2/authorize?client_id={}&redirect_uri={}&response_type=code&scope={}",
        api_base.trim_end_matches('/'),
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scopes),
    );

    Url::parse(&raw).map_err(|e| AppError::Config(format!("invalid authorization URL: {e}")))
}

/// OAuth client bound to one provider registration
pub struct OAuthClient {
    http: reqwest::Client,
    config: OAuthConfig,
}

impl OAuthClient {
    /// Create client
    ///
    /// The HTTP client carries the provider timeout so both outbound
    /// calls are bounded.
    pub fn new(config: OAuthConfig) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("Gatehouse/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    /// Where `/login` sends anonymous visitors
    pub fn authorization_url(&self) -> Result<Url, AppError> {
        build_authorization_url(
            &self.config.api_base,
            &self.config.client_id,
            &self.config.redirect_uri,
            &self.config.scopes,
        )
    }

    /// Exchange an authorization code for an access token
    ///
    /// POST {api_base}/oauth2/token (form encoded)
    ///
    /// # Errors
    /// `AppError::TokenExchange` on transport failure, timeout, a non-JSON
    /// body, or a body without `access_token`.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<AccessToken, AppError> {
        let started = Instant::now();
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let result = self
            .http
            .post(self.endpoint("/oauth2/token"))
            .form(&form)
            .send()
            .await;
        PROVIDER_REQUEST_DURATION_SECONDS
            .with_label_values(&["token"])
            .observe(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            record_request("token", "transport_error");
            tracing::error!(error = %e, timeout = e.is_timeout(), "Token request failed");
            AppError::TokenExchange(e.to_string())
        })?;

        let status = response.status();
        record_request("token", status.as_str());

        let body: serde_json::Value = response.json().await.map_err(|e| {
            tracing::error!(%status, error = %e, "Token endpoint returned a non-JSON body");
            AppError::TokenExchange(e.to_string())
        })?;

        match body.get("access_token").and_then(serde_json::Value::as_str) {
            Some(token) if !token.is_empty() => Ok(AccessToken(token.to_owned())),
            _ => {
                tracing::error!(%status, response = %body, "Token exchange failed");
                Err(AppError::TokenExchange(format!(
                    "provider response without access_token (status {status})"
                )))
            }
        }
    }

    /// Fetch the profile of the token's owner
    ///
    /// GET {api_base}/users/@me with `Authorization: Bearer`
    ///
    /// # Errors
    /// `AppError::ProfileFetch` on transport failure, timeout, non-success
    /// status, or a body missing `id`/`username`.
    pub async fn fetch_profile(&self, token: &AccessToken) -> Result<UserProfile, AppError> {
        let started = Instant::now();
        let result = self
            .http
            .get(self.endpoint("/users/@me"))
            .bearer_auth(token.secret())
            .send()
            .await;
        PROVIDER_REQUEST_DURATION_SECONDS
            .with_label_values(&["profile"])
            .observe(started.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            record_request("profile", "transport_error");
            tracing::error!(error = %e, timeout = e.is_timeout(), "Profile request failed");
            AppError::ProfileFetch(e.to_string())
        })?;

        let status = response.status();
        record_request("profile", status.as_str());

        if !status.is_success() {
            tracing::error!(%status, "Profile endpoint rejected the access token");
            return Err(AppError::ProfileFetch(format!("status {status}")));
        }

        let user: ProviderUser = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Profile endpoint returned a malformed body");
            AppError::ProfileFetch(e.to_string())
        })?;

        Ok(user.into())
    }
}

fn record_request(endpoint: &str, status: &str) {
    PROVIDER_REQUESTS_TOTAL
        .with_label_values(&[endpoint, status])
        .inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_url_encodes_redirect_and_scopes() {
        let url = build_authorization_url(
            "https://discord.com/api/v10",
            "1234",
            "https://app.example.com/auth/callback",
            "identify email",
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://discord.com/api/v10/oauth2/authorize?client_id=1234\
             &redirect_uri=https%3A%2F%2Fapp.example.com%2Fauth%2Fcallback\
             &response_type=code&scope=identify%20email"
        );
    }

    #[test]
    fn authorization_url_tolerates_trailing_slash_on_base() {
        let url = build_authorization_url(
            "https://discord.com/api/v10/",
            "1234",
            "https://app.example.com/cb",
            "identify",
        )
        .unwrap();

        assert_eq!(url.path(), "/api/v10/oauth2/authorize");
    }

    #[test]
    fn authorization_url_is_deterministic() {
        let build = || {
            build_authorization_url("https://p.example", "id", "https://a.example/cb", "a b")
                .unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn access_token_debug_is_redacted() {
        let token = AccessToken("very-secret".to_string());
        assert_eq!(format!("{token:?}"), "AccessToken(<redacted>)");
    }

    #[test]
    fn provider_user_without_avatar_maps_to_none() {
        let user: ProviderUser =
            serde_json::from_str(r#"{"id":"1","username":"ann","avatar":null,"email":"a@b.c"}"#)
                .unwrap();
        let profile = UserProfile::from(user);
        assert_eq!(profile.avatar, None);
        assert_eq!(profile.username, "ann");
    }
}
