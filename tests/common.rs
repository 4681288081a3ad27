#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use figment::providers::{Format, Yaml};
use figment::Figment;
use serde_json::Value;
use storegate::config::{extract_config, ConfigV1};
use storegate::models::{Deal, NearbyDeal, RefreshTokenRecord, StoreAccount};
use storegate::routes::create_router;
use storegate::startup::build_state_with_store;
use storegate::state::AppState;
use storegate::store::memory_store::MemoryStore;
use storegate::store::{Store, StoreError};
use storegate::utils::clock::ManualClock;
use tower::ServiceExt;

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:5050
logging:
  level: "debug"
  format: "json"
jwt:
  access_secret: test-access-secret
  refresh_secret: test-refresh-secret
password:
  cost: 4
store:
  type: memory
  purge_interval_secs: 0
geocoder:
  type: static
  postcodes:
    SW1A1AA:
      latitude: 51.5
      longitude: -0.14
    NW18AH:
      latitude: 51.539
      longitude: -0.142
    M11AE:
      latitude: 53.48
      longitude: -2.24
"#;

pub fn load_test_config() -> ConfigV1 {
    extract_config(&Figment::new().merge(Yaml::string(TEST_CONFIG)))
        .expect("Failed to parse test config YAML")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
    pub store: Arc<MemoryStore>,
}

pub fn build_app(config: ConfigV1) -> TestApp {
    build_app_with(config, |store| store)
}

/// Builds the app over a fresh in-memory store, optionally wrapped.
pub fn build_app_with(
    config: ConfigV1,
    wrap: impl FnOnce(Arc<dyn Store>) -> Arc<dyn Store>,
) -> TestApp {
    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(MemoryStore::new());
    let inner: Arc<dyn Store> = store.clone();
    let state = build_state_with_store(Arc::new(config), wrap(inner), Arc::new(clock.clone()))
    .expect("failed to build state");

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        store,
    }
}

pub fn request(method: Method, path: &str, body: Option<Value>, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let mut request = builder.body(body).expect("failed to build request");
    request.extensions_mut().insert(ConnectInfo(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        0,
    )));
    request
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub async fn send(app: &TestApp, request: Request<Body>) -> TestResponse {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn register(app: &TestApp, body: Value) -> TestResponse {
    send(app, request(Method::POST, "/api/auth/register", Some(body), None)).await
}

pub async fn login(app: &TestApp, email: &str, password: &str) -> TestResponse {
    let body = serde_json::json!({ "email": email, "password": password });
    send(app, request(Method::POST, "/api/auth/login", Some(body), None)).await
}

pub fn joe() -> Value {
    serde_json::json!({
        "store_name": "Joe's Deli",
        "email": "joe@x.com",
        "password": "secret1",
        "postcode": "SW1A1AA"
    })
}

/// Delegates to an inner store but refresh token writes never succeed.
pub struct RefreshWriteFailingStore {
    pub inner: Arc<dyn Store>,
}

#[async_trait]
impl Store for RefreshWriteFailingStore {
    fn get_name(&self) -> &str {
        "refresh-write-failing"
    }

    /// Claims the refresh token in the inner store first, so the inner
    /// register runs and fails on its refresh leg.
    async fn register_store(
        &self,
        account: &StoreAccount,
        refresh: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        self.inner.add_refresh_token(refresh).await?;
        self.inner.register_store(account, refresh).await
    }

    async fn find_store_by_email(&self, email: &str) -> Result<Option<StoreAccount>, StoreError> {
        self.inner.find_store_by_email(email).await
    }

    async fn find_store_by_id(&self, id: &str) -> Result<Option<StoreAccount>, StoreError> {
        self.inner.find_store_by_id(id).await
    }

    async fn add_refresh_token(&self, _record: &RefreshTokenRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("refresh_tokens unavailable".to_string()))
    }

    async fn get_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        self.inner.get_refresh_token(token).await
    }

    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        self.inner.purge_expired_refresh_tokens(now).await
    }

    async fn add_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        self.inner.add_deal(deal).await
    }

    async fn deals_for_store(&self, store_id: &str) -> Result<Vec<Deal>, StoreError> {
        self.inner.deals_for_store(store_id).await
    }

    async fn deals_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDeal>, StoreError> {
        self.inner.deals_near(latitude, longitude, radius_km).await
    }
}
