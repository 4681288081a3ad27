use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use super::{memory_store::MemoryStore, mongodb_store::MongoDBStore};
use crate::config::{StoreBackend, StoreConfig};
use crate::models::{Deal, NearbyDeal, RefreshTokenRecord, StoreAccount};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("refresh token already stored")]
    DuplicateToken,
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Persistence for store accounts, refresh tokens and deals.
///
/// Refresh tokens are append-only: there is no update, and rows only go away
/// through `purge_expired_refresh_tokens`.
#[async_trait]
pub trait Store: Send + Sync {
    fn get_name(&self) -> &str;

    /// Inserts a new account together with its first refresh token. Either
    /// both are stored or neither is.
    async fn register_store(
        &self,
        account: &StoreAccount,
        refresh: &RefreshTokenRecord,
    ) -> Result<(), StoreError>;
    async fn find_store_by_email(&self, email: &str) -> Result<Option<StoreAccount>, StoreError>;
    async fn find_store_by_id(&self, id: &str) -> Result<Option<StoreAccount>, StoreError>;

    /// Inserts a refresh token. A token value that is already present is
    /// rejected with `DuplicateToken`.
    async fn add_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;
    async fn get_refresh_token(&self, token: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;
    /// Deletes every refresh token whose expiry is at or before `now`.
    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn add_deal(&self, deal: &Deal) -> Result<(), StoreError>;
    /// Deals of one store, newest first.
    async fn deals_for_store(&self, store_id: &str) -> Result<Vec<Deal>, StoreError>;
    /// Deals whose store lies strictly within `radius_km`, nearest first.
    async fn deals_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDeal>, StoreError>;
}

/// Creates a concrete store implementation based on the StoreConfig.
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn Store>, String> {
    match &config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data will not survive a restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::MongoDB(mongo_config) => match MongoDBStore::new(mongo_config).await {
            Ok(store) => {
                info!("Successfully created MongoDB store.");
                Ok(Arc::new(store))
            }
            Err(e) => {
                error!("Failed to create MongoDB store: {}", e);
                Err(e)
            }
        },
    }
}

/// Sorts search hits nearest first and drops anything outside the radius.
pub(crate) fn within_radius(mut hits: Vec<NearbyDeal>, radius_km: f64) -> Vec<NearbyDeal> {
    hits.retain(|hit| hit.distance < radius_km);
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}
