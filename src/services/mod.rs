// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - token lifecycle and Fitbit access.

pub mod data;
pub mod executor;
pub mod fitbit;
pub mod refresher;

pub use data::FitbitDataService;
pub use executor::UpstreamExecutor;
pub use fitbit::{FitbitClient, TokenResponse, UpstreamStatus};
pub use refresher::{RefreshError, RefreshLocks, TokenRefresher};
