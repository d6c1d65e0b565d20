// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Web API client.
//!
//! Handles:
//! - Authenticated GETs against data endpoints
//! - Refresh-token and authorization-code grants
//! - Status classification for the request executor

use crate::config::Config;
use crate::error::AppError;
use crate::models::Credential;
use crate::services::refresher::RefreshError;
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode};
use serde::Deserialize;

/// How the executor should treat an upstream status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStatus {
    Ok,
    Unauthorized,
    RateLimited,
    Unavailable,
    Other(u16),
}

impl UpstreamStatus {
    pub fn classify(status: StatusCode) -> Self {
        match status.as_u16() {
            200 => UpstreamStatus::Ok,
            401 => UpstreamStatus::Unauthorized,
            429 => UpstreamStatus::RateLimited,
            500..=599 => UpstreamStatus::Unavailable,
            other => UpstreamStatus::Other(other),
        }
    }
}

/// Fitbit API client.
#[derive(Clone)]
pub struct FitbitClient {
    http: reqwest::Client,
    api_base: String,
    token_uri: String,
    client_id: String,
    client_secret: String,
}

impl FitbitClient {
    /// Create a client whose every call is bounded by the configured timeout.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: config.fitbit_api_base.trim_end_matches('/').to_string(),
            token_uri: config.fitbit_token_uri.clone(),
            client_id: config.fitbit_client_id.clone(),
            client_secret: config.fitbit_client_secret.clone(),
        })
    }

    /// Absolute URL for an endpoint path relative to the API base.
    pub fn data_url(&self, endpoint_path: &str) -> String {
        format!("{}/{}", self.api_base, endpoint_path.trim_start_matches('/'))
    }

    /// Issue one authenticated GET. Status handling is left to the caller.
    pub async fn get_data(
        &self,
        endpoint_path: &str,
        access_token: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.http
            .get(self.data_url(endpoint_path))
            .bearer_auth(access_token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// POST {token_uri}
    /// grant_type=refresh_token&refresh_token=..&client_id=..&client_secret=..
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Fitbit token refresh rejected");
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| RefreshError::Malformed(e.to_string()))
    }

    /// Exchange an authorization code from the OAuth callback for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_uri)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Fitbit token exchange failed");
            return Err(AppError::FitbitApi(format!(
                "Token exchange failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::FitbitApi(format!("Failed to parse token response: {}", e)))
    }
}

/// Token endpoint response (both grant types).
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, relative to the response
    pub expires_in: i64,
    /// Fitbit's encoded user ID
    #[serde(default)]
    pub user_id: Option<String>,
}

impl TokenResponse {
    /// Credential for this grant, or `Malformed` if `expires_in` is unusable.
    pub fn into_credential(self, now: DateTime<Utc>) -> Result<Credential, RefreshError> {
        let expires_in = self.expires_in;
        Credential::from_grant(self.access_token, self.refresh_token, expires_in, now)
            .ok_or_else(|| {
                RefreshError::Malformed(format!("expires_in out of range: {}", expires_in))
            })
    }
}
