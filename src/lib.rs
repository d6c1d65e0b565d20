// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Dashboard: an OAuth2 proxy in front of the Fitbit Web API.
//!
//! This crate holds each user's Fitbit credential, refreshes it when it
//! expires or is rejected, and serves steps, heart rate and sleep data to
//! the dashboard front end.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::CredentialStore;
use services::{FitbitClient, FitbitDataService, RefreshLocks};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CredentialStore>,
    pub fitbit: FitbitClient,
    pub data_service: FitbitDataService,
}

impl AppState {
    /// Build the state around `store`, with a fresh set of refresh locks.
    pub fn new(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self, reqwest::Error> {
        let refresh_locks: RefreshLocks = Arc::new(dashmap::DashMap::new());
        let fitbit = FitbitClient::new(&config)?;
        let data_service = FitbitDataService::from_config(&config, store.clone(), refresh_locks)?;

        Ok(Self {
            config,
            store,
            fitbit,
            data_service,
        })
    }
}
