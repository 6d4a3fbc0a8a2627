//! Session cookie encoding
//!
//! Cookie value format: `{handle}.base64(hmac_sha256(handle))`.
//! The signature only proves the handle was issued by this server;
//! whether it is still live is decided by the session store.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::Duration;

use super::session::SessionHandle;
use crate::config::SessionConfig;
use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Issues and reads the signed session cookie
#[derive(Clone)]
pub struct SessionCookies {
    name: String,
    secret: String,
    max_age: i64,
}

impl SessionCookies {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secret: config.secret.clone(),
            max_age: config.max_age,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn mac(&self) -> Result<HmacSha256, AppError> {
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Signing(e.to_string()))
    }

    /// Sign a handle into a cookie value
    pub fn sign(&self, handle: &SessionHandle) -> Result<String, AppError> {
        let mut mac = self.mac()?;
        mac.update(handle.as_str().as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        Ok(format!("{}.{}", handle.as_str(), signature_b64))
    }

    /// Verify a cookie value and recover the handle
    ///
    /// Returns `None` for anything malformed or signed with another key.
    pub fn verify(&self, value: &str) -> Option<SessionHandle> {
        let (handle, signature_b64) = value.rsplit_once('.')?;
        if handle.is_empty() {
            return None;
        }

        let signature = general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(handle.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(SessionHandle::from(handle.to_owned()))
    }

    /// Build the cookie that carries a freshly created session
    ///
    /// Always `Secure` with `SameSite=None`: the provider redirect back to
    /// us is a cross-site navigation, and the cookie must never travel
    /// over plain HTTP.
    pub fn issue(&self, handle: &SessionHandle) -> Result<Cookie<'static>, AppError> {
        let cookie = Cookie::build((self.name.clone(), self.sign(handle)?))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(Duration::seconds(self.max_age))
            .build();
        Ok(cookie)
    }

    /// Build the cookie that clears the session on the browser
    pub fn removal(&self) -> Cookie<'static> {
        Cookie::build((self.name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(Duration::ZERO)
            .build()
    }

    /// Extract the verified handle from a cookie jar
    pub fn handle_from_jar(&self, jar: &CookieJar) -> Option<SessionHandle> {
        jar.get(&self.name)
            .and_then(|cookie| self.verify(cookie.value()))
    }
}
