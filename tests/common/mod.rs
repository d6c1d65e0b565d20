// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    Router,
};
use chrono::{Duration, Utc};
use fitbit_dashboard::config::Config;
use fitbit_dashboard::db::{CredentialStore, FirestoreDb, InMemoryCredentialStore};
use fitbit_dashboard::models::Credential;
use fitbit_dashboard::routes::create_router;
use fitbit_dashboard::services::FitbitDataService;
use fitbit_dashboard::AppState;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const USER_ID: &str = "ABC123";

#[allow(dead_code)]
pub const STEPS_BODY: &str =
    r#"{"activities-steps":[{"dateTime":"2024-03-12","value":"8500"}]}"#;

#[allow(dead_code)]
pub const NEW_TOKEN_BODY: &str =
    r#"{"access_token":"new_token","refresh_token":"new_refresh_token","expires_in":3600}"#;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Mock Fitbit upstream ────────────────────────────────────

/// Scripted stand-in for api.fitbit.com.
///
/// Data GETs and token POSTs each pop the next scripted `(status, body)`;
/// once a script runs dry, data GETs answer 200 with `STEPS_BODY` and token
/// POSTs answer 200 with `NEW_TOKEN_BODY`.
#[derive(Default)]
pub struct MockUpstream {
    data_calls: AtomicU32,
    token_calls: AtomicU32,
    data_script: Mutex<VecDeque<(u16, String)>>,
    token_script: Mutex<VecDeque<(u16, String)>>,
    authorizations: Mutex<Vec<String>>,
    data_paths: Mutex<Vec<String>>,
    token_forms: Mutex<Vec<String>>,
    token_content_types: Mutex<Vec<String>>,
    data_delay_ms: AtomicU64,
    token_delay_ms: AtomicU64,
}

#[allow(dead_code)]
pub struct MockFitbit {
    pub addr: SocketAddr,
    upstream: Arc<MockUpstream>,
}

#[allow(dead_code)]
impl MockFitbit {
    pub async fn start() -> Self {
        let upstream = Arc::new(MockUpstream::default());
        let app = Router::new()
            .fallback(mock_handler)
            .with_state(upstream.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, upstream }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Test config pointing every Fitbit URL at this mock.
    pub fn config(&self) -> Config {
        Config {
            fitbit_api_base: self.base_url(),
            fitbit_token_uri: format!("{}/oauth2/token", self.base_url()),
            upstream_timeout: std::time::Duration::from_secs(2),
            ..Config::default()
        }
    }

    pub fn push_data(&self, status: u16, body: &str) {
        self.upstream
            .data_script
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    pub fn push_token(&self, status: u16, body: &str) {
        self.upstream
            .token_script
            .lock()
            .unwrap()
            .push_back((status, body.to_string()));
    }

    pub fn set_data_delay(&self, delay: std::time::Duration) {
        self.upstream
            .data_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_token_delay(&self, delay: std::time::Duration) {
        self.upstream
            .token_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn data_calls(&self) -> u32 {
        self.upstream.data_calls.load(Ordering::SeqCst)
    }

    pub fn token_calls(&self) -> u32 {
        self.upstream.token_calls.load(Ordering::SeqCst)
    }

    /// `Authorization` headers seen on data GETs, in order.
    pub fn authorizations(&self) -> Vec<String> {
        self.upstream.authorizations.lock().unwrap().clone()
    }

    pub fn data_paths(&self) -> Vec<String> {
        self.upstream.data_paths.lock().unwrap().clone()
    }

    /// Raw form bodies seen on token POSTs, in order.
    pub fn token_forms(&self) -> Vec<String> {
        self.upstream.token_forms.lock().unwrap().clone()
    }

    pub fn token_content_types(&self) -> Vec<String> {
        self.upstream.token_content_types.lock().unwrap().clone()
    }
}

async fn mock_handler(
    State(upstream): State<Arc<MockUpstream>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    let (status, body, delay_ms) = if method == Method::POST && uri.path() == "/oauth2/token" {
        upstream.token_calls.fetch_add(1, Ordering::SeqCst);
        upstream.token_forms.lock().unwrap().push(body);
        upstream
            .token_content_types
            .lock()
            .unwrap()
            .push(header_value(header::CONTENT_TYPE));
        let (status, body) = upstream
            .token_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, NEW_TOKEN_BODY.to_string()));
        (status, body, upstream.token_delay_ms.load(Ordering::SeqCst))
    } else {
        upstream.data_calls.fetch_add(1, Ordering::SeqCst);
        upstream
            .authorizations
            .lock()
            .unwrap()
            .push(header_value(header::AUTHORIZATION));
        upstream
            .data_paths
            .lock()
            .unwrap()
            .push(uri.path().to_string());
        let (status, body) = upstream
            .data_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((200, STEPS_BODY.to_string()));
        (status, body, upstream.data_delay_ms.load(Ordering::SeqCst))
    };

    if delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
    }

    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

// ─── Fixtures ────────────────────────────────────────────────

/// Credential valid for another hour.
#[allow(dead_code)]
pub fn valid_credential() -> Credential {
    Credential::new(
        "valid_token",
        "valid_refresh_token",
        Utc::now() + Duration::hours(1),
    )
}

/// Credential that expired a minute ago.
#[allow(dead_code)]
pub fn expired_credential() -> Credential {
    Credential::new(
        "valid_token",
        "valid_refresh_token",
        Utc::now() - Duration::minutes(1),
    )
}

/// In-memory store seeded with `credential` for `USER_ID`.
#[allow(dead_code)]
pub async fn seeded_store(credential: Option<Credential>) -> Arc<InMemoryCredentialStore> {
    let store = Arc::new(InMemoryCredentialStore::new());
    if let Some(credential) = credential {
        store.put(USER_ID, &credential).await.unwrap();
    }
    store
}

/// Data service wired to `config` and `store` with fresh refresh locks.
#[allow(dead_code)]
pub fn data_service(config: &Config, store: Arc<InMemoryCredentialStore>) -> FitbitDataService {
    FitbitDataService::from_config(config, store, Arc::new(dashmap::DashMap::new()))
        .expect("build data service")
}

/// Create a test app around `config` and `store`.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(
    config: Config,
    store: Arc<InMemoryCredentialStore>,
) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, store).expect("build app state"));
    (create_router(state.clone()), state)
}

/// Create a session JWT for `user_id`.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    fitbit_dashboard::middleware::auth::create_jwt(user_id, signing_key).expect("create jwt")
}
