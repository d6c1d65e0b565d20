// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential storage.
//!
//! The store only reads and writes whole credentials; expiry policy and
//! refresh coordination live in the services layer.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::InMemoryCredentialStore;

use crate::models::Credential;
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    /// Fitbit credentials (keyed by Fitbit user ID)
    pub const FITBIT_TOKENS: &str = "fitbit_tokens";
}

/// Per-user credential persistence.
///
/// Both operations are atomic for a single user: a reader sees either the
/// old triple or the new one, never a mix.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credential for `user_id`, if the account was ever linked.
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError>;

    /// Replace the credential for `user_id`.
    async fn put(&self, user_id: &str, credential: &Credential) -> Result<(), StoreError>;
}

/// Credential store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database not connected (offline mode)")]
    Offline,

    #[error("Stored credential is corrupt: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Backend(String),
}
