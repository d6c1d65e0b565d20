// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process credential store for local development and tests.

use super::{CredentialStore, StoreError};
use crate::models::Credential;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: DashMap<String, Credential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.credentials.get(user_id).map(|c| c.value().clone()))
    }

    async fn put(&self, user_id: &str, credential: &Credential) -> Result<(), StoreError> {
        self.credentials
            .insert(user_id.to_string(), credential.clone());
        Ok(())
    }
}
