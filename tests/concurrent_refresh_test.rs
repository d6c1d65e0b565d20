// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent refresh coordination tests.
//!
//! Many requests for one user that all see an expired token must share a
//! single refresh: Fitbit refresh tokens are single-use, so a second POST
//! with the same token would invalidate the account.

use chrono::{Duration, Utc};
use fitbit_dashboard::db::CredentialStore;
use fitbit_dashboard::error::FetchError;
use fitbit_dashboard::models::{Credential, DataKind};
use futures_util::future::join_all;
use std::time::Duration as StdDuration;

mod common;
use common::{data_service, expired_credential, seeded_store, MockFitbit, USER_ID};

#[tokio::test]
async fn test_concurrent_expired_requests_refresh_once() {
    let mock = MockFitbit::start().await;
    // Hold the token endpoint open so every request queues behind the lock.
    mock.set_token_delay(StdDuration::from_millis(200));
    let store = seeded_store(Some(expired_credential())).await;
    let service = data_service(&mock.config(), store.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .fetch(USER_ID, DataKind::Steps, "2024-03-12")
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.data_calls(), 10);
    assert!(mock
        .authorizations()
        .iter()
        .all(|auth| auth == "Bearer new_token"));
    assert_eq!(
        store.get(USER_ID).await.unwrap().unwrap().refresh_token,
        "new_refresh_token"
    );
}

#[tokio::test]
async fn test_concurrent_401s_refresh_once() {
    let mock = MockFitbit::start().await;
    for _ in 0..5 {
        mock.push_data(401, "{}");
    }
    mock.set_token_delay(StdDuration::from_millis(200));
    let credential = Credential::new(
        "revoked_token",
        "valid_refresh_token",
        Utc::now() + Duration::hours(1),
    );
    let store = seeded_store(Some(credential)).await;
    let service = data_service(&mock.config(), store);

    let results =
        join_all((0..5).map(|_| service.fetch(USER_ID, DataKind::HeartRate, "2024-03-12"))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.data_calls(), 10);
}

#[tokio::test]
async fn test_concurrent_requests_share_failed_refresh() {
    let mock = MockFitbit::start().await;
    // Only the first token POST fails; any further POST would succeed.
    mock.push_token(500, r#"{"errors":[{"errorType":"system"}]}"#);
    mock.set_token_delay(StdDuration::from_millis(200));
    let original = expired_credential();
    let store = seeded_store(Some(original.clone())).await;
    let service = data_service(&mock.config(), store.clone());

    let results =
        join_all((0..5).map(|_| service.fetch(USER_ID, DataKind::Steps, "2024-03-12"))).await;

    for result in results {
        assert_eq!(result.unwrap_err(), FetchError::AuthenticationFailed);
    }
    assert_eq!(mock.token_calls(), 1);
    assert_eq!(mock.data_calls(), 0);
    assert_eq!(store.get(USER_ID).await.unwrap().unwrap(), original);

    // A request arriving right after the failure does not spend the token again.
    let err = service
        .fetch(USER_ID, DataKind::Steps, "2024-03-12")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::AuthenticationFailed);
    assert_eq!(mock.token_calls(), 1);
}

#[tokio::test]
async fn test_different_users_refresh_independently() {
    let mock = MockFitbit::start().await;
    let store = seeded_store(Some(expired_credential())).await;
    store.put("OTHER1", &expired_credential()).await.unwrap();
    let service = data_service(&mock.config(), store);

    let (a, b) = tokio::join!(
        service.fetch(USER_ID, DataKind::Steps, "2024-03-12"),
        service.fetch("OTHER1", DataKind::Steps, "2024-03-12"),
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(mock.token_calls(), 2);
}

#[tokio::test]
async fn test_cancelled_caller_does_not_lose_rotation() {
    let mock = MockFitbit::start().await;
    mock.set_token_delay(StdDuration::from_millis(300));
    let store = seeded_store(Some(expired_credential())).await;
    let service = data_service(&mock.config(), store.clone());

    let deadline = tokio::time::Instant::now() + StdDuration::from_millis(50);
    let result = service
        .fetch_with_deadline(USER_ID, DataKind::Steps, "2024-03-12", deadline)
        .await;
    assert!(result.is_err());

    // The refresh already sent keeps running and lands in the store.
    tokio::time::sleep(StdDuration::from_millis(600)).await;
    let stored = store.get(USER_ID).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "new_token");
    assert_eq!(stored.refresh_token, "new_refresh_token");

    service
        .fetch(USER_ID, DataKind::Steps, "2024-03-12")
        .await
        .unwrap();
    assert_eq!(mock.token_calls(), 1);
}
