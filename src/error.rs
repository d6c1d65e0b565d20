// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types: the data-fetch taxonomy and its HTTP rendering.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Outcome of a failed logical data request.
///
/// Every variant is terminal for the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid date format")]
    InvalidDate,

    #[error("Fitbit account not connected")]
    NotConnected,

    #[error("Fitbit authentication failed")]
    AuthenticationFailed,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Fitbit API unavailable")]
    UpstreamUnavailable,

    #[error("Fitbit API error: {status_code}")]
    UpstreamError { status_code: u16 },

    #[error("Fitbit API returned malformed JSON")]
    InvalidResponse,

    #[error("Credential store error: {0}")]
    Storage(String),
}

impl From<StoreError> for FetchError {
    fn from(err: StoreError) -> Self {
        FetchError::Storage(err.to_string())
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Fitbit API error: {0}")]
    FitbitApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Database(err.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl AppError {
    /// Status code and stable error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Fetch(err) => match err {
                FetchError::InvalidDate => (StatusCode::BAD_REQUEST, "invalid_date"),
                FetchError::NotConnected => (StatusCode::UNAUTHORIZED, "not_connected"),
                FetchError::AuthenticationFailed => {
                    (StatusCode::UNAUTHORIZED, "authentication_failed")
                }
                FetchError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
                FetchError::UpstreamUnavailable => {
                    (StatusCode::SERVICE_UNAVAILABLE, "upstream_unavailable")
                }
                FetchError::UpstreamError { .. } => (StatusCode::BAD_REQUEST, "fitbit_error"),
                FetchError::InvalidResponse => (StatusCode::BAD_REQUEST, "fitbit_error"),
                FetchError::Storage(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            },
            AppError::FitbitApi(_) => (StatusCode::BAD_GATEWAY, "fitbit_error"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();

        let details = match &self {
            AppError::Unauthorized => None,
            AppError::Fetch(FetchError::Storage(msg)) | AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                None
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                None
            }
            other => Some(other.to_string()),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
