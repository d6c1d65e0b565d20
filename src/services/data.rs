// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data endpoint facade: (user, kind, date) in, Fitbit JSON out.

use crate::config::Config;
use crate::db::CredentialStore;
use crate::error::FetchError;
use crate::models::{DataKind, DataRequest, NormalizedResult};
use crate::services::executor::UpstreamExecutor;
use crate::services::fitbit::FitbitClient;
use crate::services::refresher::{RefreshLocks, TokenRefresher};
use std::sync::Arc;
use tokio::time::Instant;

/// High-level Fitbit data service used by the API routes.
#[derive(Clone)]
pub struct FitbitDataService {
    executor: UpstreamExecutor,
}

impl FitbitDataService {
    pub fn new(executor: UpstreamExecutor) -> Self {
        Self { executor }
    }

    /// Wire client, refresher and executor from configuration.
    ///
    /// `refresh_locks` should be shared by every service instance that
    /// talks to the same credential store within this process.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        refresh_locks: RefreshLocks,
    ) -> Result<Self, reqwest::Error> {
        let client = FitbitClient::new(config)?;
        let refresher = TokenRefresher::new(client.clone(), store.clone(), refresh_locks);
        let executor = UpstreamExecutor::new(
            client,
            store,
            refresher,
            chrono::Duration::seconds(config.token_refresh_margin_secs),
        );
        Ok(Self::new(executor))
    }

    /// Fetch one day of `kind` for `user_id`.
    ///
    /// An invalid date is rejected before the store or network is touched.
    pub async fn fetch(
        &self,
        user_id: &str,
        kind: DataKind,
        date: &str,
    ) -> Result<NormalizedResult, FetchError> {
        let request = DataRequest::new(user_id, kind, date)?;

        tracing::debug!(
            user_id,
            kind = %request.kind,
            date = %request.date,
            "Fetching Fitbit data"
        );

        self.executor
            .execute(&request.user_id, &request.endpoint_path())
            .await
    }

    /// Like [`fetch`](Self::fetch), bounded by `deadline`.
    pub async fn fetch_with_deadline(
        &self,
        user_id: &str,
        kind: DataKind,
        date: &str,
        deadline: Instant,
    ) -> Result<NormalizedResult, FetchError> {
        match tokio::time::timeout_at(deadline, self.fetch(user_id, kind, date)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(user_id, kind = %kind, "Fitbit fetch deadline exceeded");
                Err(FetchError::UpstreamUnavailable)
            }
        }
    }
}
