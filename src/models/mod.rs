// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod credential;
pub mod data;

pub use credential::{Credential, StoredCredential};
pub use data::{DataKind, DataRequest, FitbitDate, NormalizedResult};
