// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fitbit Dashboard API Server
//!
//! Serves Fitbit steps, heart rate and sleep data to the dashboard,
//! refreshing each user's OAuth token as needed.

use fitbit_dashboard::{
    config::{Config, CredentialBackend},
    db::{CredentialStore, FirestoreDb, InMemoryCredentialStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Fitbit Dashboard API");

    let store: Arc<dyn CredentialStore> = match config.credential_store {
        CredentialBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        CredentialBackend::Memory => {
            tracing::warn!("Using in-memory credential store; tokens are lost on restart");
            Arc::new(InMemoryCredentialStore::new())
        }
    };

    tracing::info!(
        timeout_secs = config.upstream_timeout.as_secs(),
        refresh_margin_secs = config.token_refresh_margin_secs,
        "Fitbit client initialized"
    );

    let state = Arc::new(AppState::new(config.clone(), store)?);

    // Build router
    let app = fitbit_dashboard::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fitbit_dashboard=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();

    Ok(())
}
