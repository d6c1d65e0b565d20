// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated upstream GETs with one refresh-and-retry.
//!
//! ```text
//! INITIAL ──(expired)──────────────► REFRESHING
//!    │                                   │
//!    ▼                                   ▼
//!  SENT ──401──► REFRESHING ──► RETRIED (SENT again)
//!    │                               │
//!    ├─200──► SUCCESS                ├─200──► SUCCESS
//!    └─other► FAILED                 └─401/other──► FAILED
//! ```
//!
//! A logical request performs at most one refresh. Once it has been spent,
//! either proactively or after a 401, a further 401 is final.

use crate::db::CredentialStore;
use crate::error::FetchError;
use crate::models::{Credential, NormalizedResult};
use crate::services::fitbit::{FitbitClient, UpstreamStatus};
use crate::services::refresher::TokenRefresher;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Refreshes a single logical request may perform.
const MAX_REFRESHES_PER_REQUEST: u32 = 1;

/// Result of one GET.
enum Attempt {
    Success(NormalizedResult),
    AuthRejected,
    Failed(FetchError),
}

/// Executes authenticated GETs on behalf of a user.
#[derive(Clone)]
pub struct UpstreamExecutor {
    client: FitbitClient,
    store: Arc<dyn CredentialStore>,
    refresher: TokenRefresher,
    refresh_margin: Duration,
}

impl UpstreamExecutor {
    pub fn new(
        client: FitbitClient,
        store: Arc<dyn CredentialStore>,
        refresher: TokenRefresher,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            client,
            store,
            refresher,
            refresh_margin,
        }
    }

    /// GET `endpoint_path` as `user_id`, refreshing the token at most once.
    pub async fn execute(
        &self,
        user_id: &str,
        endpoint_path: &str,
    ) -> Result<NormalizedResult, FetchError> {
        let mut credential = self
            .store
            .get(user_id)
            .await?
            .filter(Credential::is_connected)
            .ok_or(FetchError::NotConnected)?;

        let mut refreshes = 0;

        if credential.is_expired(Utc::now(), self.refresh_margin) {
            tracing::debug!(user_id, "Access token expired locally, refreshing before request");
            credential = self.refresh(user_id, &credential).await?;
            refreshes += 1;
        }

        loop {
            match self.send(endpoint_path, &credential).await {
                Attempt::Success(body) => return Ok(body),
                Attempt::AuthRejected if refreshes < MAX_REFRESHES_PER_REQUEST => {
                    tracing::info!(user_id, "Fitbit rejected access token, refreshing");
                    credential = self.refresh(user_id, &credential).await?;
                    refreshes += 1;
                }
                Attempt::AuthRejected => {
                    tracing::warn!(
                        user_id,
                        "Fitbit rejected refreshed access token, giving up"
                    );
                    return Err(FetchError::AuthenticationFailed);
                }
                Attempt::Failed(err) => return Err(err),
            }
        }
    }

    async fn refresh(&self, user_id: &str, stale: &Credential) -> Result<Credential, FetchError> {
        self.refresher
            .refresh(user_id, stale)
            .await
            .map_err(|e| {
                tracing::warn!(user_id, error = %e, "Token refresh failed");
                FetchError::from(e)
            })
    }

    async fn send(&self, endpoint_path: &str, credential: &Credential) -> Attempt {
        let response = match self
            .client
            .get_data(endpoint_path, &credential.access_token)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    endpoint = endpoint_path,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Fitbit request failed"
                );
                return Attempt::Failed(FetchError::UpstreamUnavailable);
            }
        };

        let status = response.status();
        match UpstreamStatus::classify(status) {
            UpstreamStatus::Ok => match response.text().await {
                Ok(body) => match NormalizedResult::from_body(body) {
                    Ok(result) => Attempt::Success(result),
                    Err(e) => {
                        tracing::warn!(endpoint = endpoint_path, error = %e, "Fitbit returned non-JSON body");
                        Attempt::Failed(FetchError::InvalidResponse)
                    }
                },
                Err(e) => {
                    tracing::warn!(endpoint = endpoint_path, error = %e, "Failed to read Fitbit response body");
                    Attempt::Failed(FetchError::UpstreamUnavailable)
                }
            },
            UpstreamStatus::Unauthorized => Attempt::AuthRejected,
            UpstreamStatus::RateLimited => {
                tracing::warn!(endpoint = endpoint_path, "Fitbit rate limit hit (429)");
                Attempt::Failed(FetchError::RateLimited)
            }
            UpstreamStatus::Unavailable => {
                tracing::warn!(endpoint = endpoint_path, status = %status, "Fitbit unavailable");
                Attempt::Failed(FetchError::UpstreamUnavailable)
            }
            UpstreamStatus::Other(status_code) => {
                Attempt::Failed(FetchError::UpstreamError { status_code })
            }
        }
    }
}
