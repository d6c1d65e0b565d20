// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed credential store.
//!
//! Each user's credential is one document in `fitbit_tokens`, so a write
//! replaces the full triple in a single operation.

use crate::db::{collections, CredentialStore, StoreError};
use crate::models::{Credential, StoredCredential};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StoreError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StoreError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StoreError> {
        self.client.as_ref().ok_or(StoreError::Offline)
    }

    /// Raw stored document for a user.
    pub async fn get_stored_credential(
        &self,
        user_id: &str,
    ) -> Result<Option<StoredCredential>, StoreError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::FITBIT_TOKENS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Overwrite the stored document for a user.
    pub async fn set_stored_credential(
        &self,
        user_id: &str,
        stored: &StoredCredential,
    ) -> Result<(), StoreError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::FITBIT_TOKENS)
            .document_id(user_id)
            .object(stored)
            .execute()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FirestoreDb {
    async fn get(&self, user_id: &str) -> Result<Option<Credential>, StoreError> {
        self.get_stored_credential(user_id)
            .await?
            .map(|stored| {
                Credential::try_from(stored).map_err(|e| {
                    StoreError::Corrupt(format!("expires_at for user {}: {}", user_id, e))
                })
            })
            .transpose()
    }

    async fn put(&self, user_id: &str, credential: &Credential) -> Result<(), StoreError> {
        self.set_stored_credential(user_id, &StoredCredential::from(credential))
            .await
    }
}
