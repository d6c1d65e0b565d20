// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit OAuth connect flow and session routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::routes::is_allowed_origin;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Scopes needed for the dashboard's three data kinds.
const FITBIT_SCOPES: &str = "activity heartrate sleep profile";

/// How long a signed OAuth `state` stays valid (10 minutes).
const OAUTH_STATE_MAX_AGE_MILLIS: u128 = 10 * 60 * 1000;

/// Tolerated clock skew for a `state` stamped slightly in the future.
const OAUTH_STATE_SKEW_MILLIS: u128 = 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/fitbit", get(auth_start))
        .route("/auth/fitbit/callback", get(auth_callback))
        .route("/auth/logout", post(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to return to once the account is linked.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to the Fitbit consent page.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let config = &state.config;

    let frontend_url = match params.redirect_uri {
        Some(url) if is_allowed_origin(&url, &config.frontend_url) => url,
        Some(_) => return Err(AppError::BadRequest("Unknown redirect_uri".to_string())),
        None => config.frontend_url.clone(),
    };

    let oauth_state = sign_state(&frontend_url, now_millis()?, &config.oauth_state_key)?;

    let auth_url = format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        config.fitbit_authorize_uri,
        urlencoding::encode(&config.fitbit_client_id),
        urlencoding::encode(&config.fitbit_redirect_uri),
        urlencoding::encode(FITBIT_SCOPES),
        oauth_state
    );

    tracing::info!(
        client_id = %config.fitbit_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Fitbit"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, store them, start a session.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    let config = &state.config;

    let now = now_millis()?;
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &config.oauth_state_key, now))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid, expired or tampered state parameter, falling back to default frontend URL"
            );
            config.frontend_url.clone()
        });

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Fitbit");
        let redirect = format!("{}?error={}", frontend_url, urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let grant = state
        .fitbit
        .exchange_code(&code, &config.fitbit_redirect_uri)
        .await?;

    let user_id = grant
        .user_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::FitbitApi("Token response missing user_id".to_string()))?;

    let credential = grant
        .into_credential(chrono::Utc::now())
        .map_err(|e| AppError::FitbitApi(e.to_string()))?;
    state.store.put(&user_id, &credential).await?;

    tracing::info!(user_id = %user_id, "Fitbit account connected");

    let jwt = create_jwt(&user_id, &config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let secure = config.fitbit_redirect_uri.starts_with("https://");
    let jar = jar.add(session_cookie(jwt, secure));

    Ok((
        jar,
        Redirect::temporary(&format!("{}/dashboard", frontend_url)),
    ))
}

/// Logout - drop the session cookie. Stored Fitbit credentials are kept.
async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let removal = Cookie::build(SESSION_COOKIE).path("/");
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

fn session_cookie(jwt: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS as i64))
        .build()
}

fn state_signature(payload: &str, key: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(payload.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Build the OAuth `state` value: base64url("frontend|ts_hex|hmac_hex").
fn sign_state(frontend_url: &str, timestamp_millis: u128, key: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", frontend_url, timestamp_millis);
    let signature = state_signature(&payload, key)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HMAC init failed")))?;

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// Check the signature and age of an OAuth `state` value and return its
/// frontend URL.
fn verify_state(state: &str, key: &[u8], now_millis: u128) -> Option<String> {
    let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(state).ok()?).ok()?;

    // The URL itself may contain '|', so split the two trailing fields off the right.
    let mut parts = decoded.rsplitn(3, '|');
    let signature = parts.next()?;
    let timestamp_hex = parts.next()?;
    let frontend_url = parts.next()?;

    let expected = state_signature(&format!("{}|{}", frontend_url, timestamp_hex), key)?;
    if expected != signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if issued_at > now_millis + OAUTH_STATE_SKEW_MILLIS
        || now_millis.saturating_sub(issued_at) > OAUTH_STATE_MAX_AGE_MILLIS
    {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(frontend_url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISSUED: u128 = 1_710_000_000_000;

    #[test]
    fn test_state_roundtrip() {
        let key = b"secret_key";
        let signed = sign_state("https://dash.example.com", ISSUED, key).unwrap();

        assert_eq!(
            verify_state(&signed, key, ISSUED + 5_000),
            Some("https://dash.example.com".to_string())
        );
    }

    #[test]
    fn test_state_expires() {
        let key = b"secret_key";
        let signed = sign_state("https://dash.example.com", ISSUED, key).unwrap();

        assert!(verify_state(&signed, key, ISSUED + OAUTH_STATE_MAX_AGE_MILLIS).is_some());
        assert_eq!(
            verify_state(&signed, key, ISSUED + OAUTH_STATE_MAX_AGE_MILLIS + 1),
            None
        );
        assert_eq!(verify_state(&signed, key, ISSUED + 24 * 60 * 60 * 1000), None);
    }

    #[test]
    fn test_state_from_the_future_rejected() {
        let key = b"secret_key";
        let signed = sign_state("https://dash.example.com", ISSUED, key).unwrap();

        assert!(verify_state(&signed, key, ISSUED - 1_000).is_some());
        assert_eq!(verify_state(&signed, key, ISSUED - 10 * 60 * 1000), None);
    }

    #[test]
    fn test_state_is_url_safe() {
        let signed = sign_state("http://localhost:5173", ISSUED, b"k").unwrap();

        assert!(!signed.contains('+'));
        assert!(!signed.contains('/'));
        assert!(!signed.contains('='));
    }

    #[test]
    fn test_state_wrong_key() {
        let signed = sign_state("https://dash.example.com", ISSUED, b"secret_key").unwrap();
        assert_eq!(verify_state(&signed, b"wrong_key", ISSUED), None);
    }

    #[test]
    fn test_state_tampered_url() {
        let signed = sign_state("https://dash.example.com", ISSUED, b"secret_key").unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&signed).unwrap()).unwrap();
        let tampered = URL_SAFE_NO_PAD.encode(decoded.replace("dash.example.com", "evil.example"));

        assert_eq!(verify_state(&tampered, b"secret_key", ISSUED), None);
    }

    #[test]
    fn test_state_malformed() {
        assert_eq!(verify_state("not-valid-base64!!!", b"k", ISSUED), None);
        assert_eq!(
            verify_state(&URL_SAFE_NO_PAD.encode("invalid|format"), b"k", ISSUED),
            None
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("jwt".to_string(), true).to_string();

        assert!(cookie.starts_with("fitbit_session=jwt"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
    }
}
