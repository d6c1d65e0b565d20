// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token refresh with per-user serialization.
//!
//! Fitbit invalidates a refresh token on first use, so two requests for the
//! same user must never both spend it. The refresher holds a per-user lock
//! around read-refresh-write and, once inside, re-reads the store: if the
//! access token no longer matches the one the caller saw, another request
//! already rotated it and that credential is handed back instead. If the
//! previous attempt for the same credential failed moments ago, waiters get
//! that outcome rather than posting the refresh token again.

use crate::db::{CredentialStore, StoreError};
use crate::error::FetchError;
use crate::models::Credential;
use crate::services::fitbit::FitbitClient;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// How long a failed refresh answers for the credential it was attempted on.
const FAILED_REFRESH_TTL: Duration = Duration::from_secs(30);

/// Shared refresh locks type, keyed by user ID.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<RefreshSlot>>>>;

/// Per-user refresh state, only touched while holding the user's lock.
#[derive(Debug, Default)]
pub struct RefreshSlot {
    last_failure: Option<FailedRefresh>,
}

#[derive(Debug)]
struct FailedRefresh {
    stale_access: String,
    outcome: FetchError,
    at: Instant,
}

impl RefreshSlot {
    fn recent_failure(&self, stale_access: &str, now: Instant) -> Option<FetchError> {
        self.last_failure
            .as_ref()
            .filter(|f| {
                f.stale_access == stale_access
                    && now.saturating_duration_since(f.at) < FAILED_REFRESH_TTL
            })
            .map(|f| f.outcome.clone())
    }

    fn record_failure(&mut self, stale_access: &str, outcome: FetchError, now: Instant) {
        self.last_failure = Some(FailedRefresh {
            stale_access: stale_access.to_string(),
            outcome,
            at: now,
        });
    }
}

/// Why a refresh did not produce a new credential.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("No credential on file")]
    NotConnected,

    #[error("No refresh token on file")]
    MissingRefreshToken,

    #[error("Token endpoint returned {status}")]
    Rejected { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    Malformed(String),

    #[error("Token request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Refresh task aborted: {0}")]
    Aborted(String),

    #[error("Refresh for this credential just failed: {0}")]
    RecentFailure(FetchError),
}

impl RefreshError {
    /// Caller-visible classification of this failure.
    pub fn fetch_error(&self) -> FetchError {
        match self {
            RefreshError::NotConnected => FetchError::NotConnected,
            RefreshError::Transport(_) => FetchError::UpstreamUnavailable,
            RefreshError::Store(e) => FetchError::Storage(e.to_string()),
            RefreshError::RecentFailure(outcome) => outcome.clone(),
            RefreshError::MissingRefreshToken
            | RefreshError::Rejected { .. }
            | RefreshError::Malformed(_)
            | RefreshError::Aborted(_) => FetchError::AuthenticationFailed,
        }
    }
}

impl From<RefreshError> for FetchError {
    fn from(err: RefreshError) -> Self {
        err.fetch_error()
    }
}

/// Exchanges refresh tokens and persists the result.
#[derive(Clone)]
pub struct TokenRefresher {
    client: FitbitClient,
    store: Arc<dyn CredentialStore>,
    /// Per-user mutex to serialize token refresh operations.
    locks: RefreshLocks,
}

impl TokenRefresher {
    pub fn new(client: FitbitClient, store: Arc<dyn CredentialStore>, locks: RefreshLocks) -> Self {
        Self {
            client,
            store,
            locks,
        }
    }

    /// Replace `stale` with a fresh credential for `user_id`.
    ///
    /// Returns either the credential this call obtained from Fitbit or the
    /// one a concurrent refresh for the same user just stored. The locked
    /// section runs on its own task so a caller that gives up (deadline,
    /// disconnect) cannot leave a spent refresh token unpersisted.
    pub async fn refresh(&self, user_id: &str, stale: &Credential) -> Result<Credential, RefreshError> {
        let this = self.clone();
        let user_id = user_id.to_string();
        let stale_access = stale.access_token.clone();

        tokio::spawn(async move { this.refresh_serialized(&user_id, &stale_access).await })
            .await
            .map_err(|e| RefreshError::Aborted(e.to_string()))?
    }

    async fn refresh_serialized(
        &self,
        user_id: &str,
        stale_access: &str,
    ) -> Result<Credential, RefreshError> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_default()
            .clone();

        let mut slot = lock.lock().await;

        // Re-read under the lock; another task may have refreshed while we waited.
        let current = self
            .store
            .get(user_id)
            .await?
            .filter(Credential::is_connected)
            .ok_or(RefreshError::NotConnected)?;

        if current.access_token != stale_access {
            tracing::debug!(user_id, "Credential already rotated by a concurrent refresh");
            return Ok(current);
        }

        if let Some(outcome) = slot.recent_failure(stale_access, Instant::now()) {
            tracing::debug!(user_id, "Refresh for this credential failed moments ago, not retrying");
            return Err(RefreshError::RecentFailure(outcome));
        }

        match self.rotate(user_id, &current).await {
            Ok(refreshed) => {
                slot.last_failure = None;
                Ok(refreshed)
            }
            Err(e) => {
                slot.record_failure(stale_access, e.fetch_error(), Instant::now());
                Err(e)
            }
        }
    }

    /// Exchange and persist. Caller holds the user's lock.
    async fn rotate(&self, user_id: &str, current: &Credential) -> Result<Credential, RefreshError> {
        tracing::info!(user_id, "Refreshing Fitbit access token");

        let refreshed = self.exchange(current).await?;

        if let Err(e) = self.store.put(user_id, &refreshed).await {
            tracing::error!(user_id, error = %e, "Refreshed credential could not be stored");
            return Err(e.into());
        }

        tracing::info!(
            user_id,
            expires_at = %refreshed.expires_at,
            "Fitbit token refreshed"
        );
        Ok(refreshed)
    }

    /// One token-endpoint call for `credential`. Neither locks nor persists.
    pub async fn exchange(&self, credential: &Credential) -> Result<Credential, RefreshError> {
        if credential.refresh_token.is_empty() {
            return Err(RefreshError::MissingRefreshToken);
        }

        let grant = self.client.refresh_token(&credential.refresh_token).await?;
        grant.into_credential(Utc::now())
    }
}
