// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development; in production the
//! secrets are injected into the environment by the platform.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which backend holds the per-user credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialBackend {
    Firestore,
    Memory,
}

impl FromStr for CredentialBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid("CREDENTIAL_STORE")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Fitbit OAuth client ---
    /// Fitbit OAuth client ID (public)
    pub fitbit_client_id: String,
    /// Fitbit OAuth client secret
    pub fitbit_client_secret: String,
    /// Base URL of the Fitbit data API
    pub fitbit_api_base: String,
    /// Fitbit token endpoint
    pub fitbit_token_uri: String,
    /// Fitbit consent page
    pub fitbit_authorize_uri: String,
    /// Callback URL registered with Fitbit
    pub fitbit_redirect_uri: String,

    // --- Upstream policy ---
    /// Timeout applied to every single upstream call
    pub upstream_timeout: Duration,
    /// Deadline for one inbound data request, refresh and retry included
    pub request_deadline: Duration,
    /// Refresh proactively when the token expires within this many seconds
    pub token_refresh_margin_secs: i64,

    // --- Server ---
    /// Frontend URL for OAuth redirects and CORS
    pub frontend_url: String,
    /// Credential store backend
    pub credential_store: CredentialBackend,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            fitbit_client_id: "test_client_id".to_string(),
            fitbit_client_secret: "test_client_secret".to_string(),
            fitbit_api_base: "https://api.fitbit.com".to_string(),
            fitbit_token_uri: "https://api.fitbit.com/oauth2/token".to_string(),
            fitbit_authorize_uri: "https://www.fitbit.com/oauth2/authorize".to_string(),
            fitbit_redirect_uri: "http://localhost:3000/auth/fitbit/callback".to_string(),
            upstream_timeout: Duration::from_secs(5),
            request_deadline: Duration::from_secs(15),
            token_refresh_margin_secs: 60,
            frontend_url: "http://localhost:5173".to_string(),
            credential_store: CredentialBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!!".to_vec(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = required("JWT_SIGNING_KEY")?.into_bytes();
        let oauth_state_key = env::var("OAUTH_STATE_KEY")
            .map(|v| v.trim().as_bytes().to_vec())
            .unwrap_or_else(|_| jwt_signing_key.clone());

        Ok(Self {
            fitbit_client_id: required("FITBIT_CLIENT_ID")?,
            fitbit_client_secret: required("FITBIT_CLIENT_SECRET")?,
            fitbit_api_base: env_or("FITBIT_API_BASE", "https://api.fitbit.com"),
            fitbit_token_uri: env_or("FITBIT_TOKEN_URI", "https://api.fitbit.com/oauth2/token"),
            fitbit_authorize_uri: env_or(
                "FITBIT_AUTHORIZE_URI",
                "https://www.fitbit.com/oauth2/authorize",
            ),
            fitbit_redirect_uri: env_or(
                "FITBIT_REDIRECT_URI",
                "http://localhost:3000/auth/fitbit/callback",
            ),
            upstream_timeout: Duration::from_secs(parsed("FITBIT_TIMEOUT_SECS", 5)?),
            request_deadline: Duration::from_secs(parsed("REQUEST_DEADLINE_SECS", 15)?),
            token_refresh_margin_secs: parsed("TOKEN_REFRESH_MARGIN_SECS", 60)?,
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            credential_store: env_or("CREDENTIAL_STORE", "firestore").parse()?,
            gcp_project_id: env_or("GCP_PROJECT_ID", "local-dev"),
            port: parsed("PORT", 8080)?,
            jwt_signing_key,
            oauth_state_key,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
