// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::credential::format_utc_rfc3339;
use crate::models::{DataKind, NormalizedResult};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/fitbit/data/steps", get(get_steps))
        .route("/api/fitbit/data/heart_rate", get(get_heart_rate))
        .route("/api/fitbit/data/sleep", get(get_sleep))
}

// ─── Connection Status ───────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub connected: bool,
    pub token_expires_at: Option<String>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let credential = state
        .store
        .get(&user.user_id)
        .await?
        .filter(|c| c.is_connected());

    Ok(Json(MeResponse {
        connected: credential.is_some(),
        token_expires_at: credential.map(|c| format_utc_rfc3339(c.expires_at)),
        user_id: user.user_id,
    }))
}

// ─── Fitbit Data ─────────────────────────────────────────────

#[derive(Deserialize)]
struct DateQuery {
    /// Day to fetch (YYYY-MM-DD)
    date: Option<String>,
}

async fn get_steps(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<NormalizedResult>> {
    fetch_data(&state, &user, query, DataKind::Steps).await
}

async fn get_heart_rate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<NormalizedResult>> {
    fetch_data(&state, &user, query, DataKind::HeartRate).await
}

async fn get_sleep(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<DateQuery>,
) -> Result<Json<NormalizedResult>> {
    fetch_data(&state, &user, query, DataKind::Sleep).await
}

async fn fetch_data(
    state: &AppState,
    user: &AuthUser,
    query: DateQuery,
    kind: DataKind,
) -> Result<Json<NormalizedResult>> {
    let date = query
        .date
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::BadRequest("Date parameter is required".to_string()))?;

    let deadline = tokio::time::Instant::now() + state.config.request_deadline;

    let result = state
        .data_service
        .fetch_with_deadline(&user.user_id, kind, &date, deadline)
        .await
        .inspect_err(|e| {
            tracing::info!(user_id = %user.user_id, kind = %kind, error = %e, "Fitbit fetch failed");
        })?;

    Ok(Json(result))
}
