use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use super::base::{within_radius, Store, StoreError};
use crate::models::deal::distance_km;
use crate::models::{Deal, NearbyDeal, RefreshTokenRecord, StoreAccount};

#[derive(Default)]
struct Tables {
    stores: HashMap<String, StoreAccount>,
    /// email -> store id; the unique index on email.
    emails: HashMap<String, String>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    deals: Vec<Deal>,
}

/// A process-local store. Every operation takes the single lock, so
/// multi-row writes are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_count(&self) -> usize {
        self.tables.read().await.stores.len()
    }

    pub async fn refresh_token_count(&self) -> usize {
        self.tables.read().await.refresh_tokens.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn get_name(&self) -> &str {
        "memory"
    }

    async fn register_store(
        &self,
        account: &StoreAccount,
        refresh: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&account.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if tables.stores.contains_key(&account.id) {
            return Err(StoreError::Backend(format!(
                "store id '{}' already exists",
                account.id
            )));
        }
        if tables.refresh_tokens.contains_key(&refresh.token) {
            return Err(StoreError::DuplicateToken);
        }

        tables
            .emails
            .insert(account.email.clone(), account.id.clone());
        tables.stores.insert(account.id.clone(), account.clone());
        tables
            .refresh_tokens
            .insert(refresh.token.clone(), refresh.clone());
        debug!("Registered store '{}' in memory", account.id);
        Ok(())
    }

    async fn find_store_by_email(&self, email: &str) -> Result<Option<StoreAccount>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .emails
            .get(email)
            .and_then(|id| tables.stores.get(id))
            .cloned())
    }

    async fn find_store_by_id(&self, id: &str) -> Result<Option<StoreAccount>, StoreError> {
        Ok(self.tables.read().await.stores.get(id).cloned())
    }

    async fn add_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.contains_key(&record.token) {
            return Err(StoreError::DuplicateToken);
        }
        tables
            .refresh_tokens
            .insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn get_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self.tables.read().await.refresh_tokens.get(token).cloned())
    }

    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.refresh_tokens.len();
        tables
            .refresh_tokens
            .retain(|_, record| !record.is_expired(now));
        Ok((before - tables.refresh_tokens.len()) as u64)
    }

    async fn add_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.stores.contains_key(&deal.store_id) {
            return Err(StoreError::Backend(format!(
                "deal references unknown store '{}'",
                deal.store_id
            )));
        }
        tables.deals.push(deal.clone());
        Ok(())
    }

    async fn deals_for_store(&self, store_id: &str) -> Result<Vec<Deal>, StoreError> {
        let tables = self.tables.read().await;
        let mut deals: Vec<Deal> = tables
            .deals
            .iter()
            .filter(|deal| deal.store_id == store_id)
            .cloned()
            .collect();
        deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(deals)
    }

    async fn deals_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDeal>, StoreError> {
        let tables = self.tables.read().await;
        let hits = tables
            .deals
            .iter()
            .filter_map(|deal| {
                let store = tables.stores.get(&deal.store_id)?;
                Some(NearbyDeal {
                    deal: deal.clone(),
                    store_name: store.store_name.clone(),
                    latitude: store.latitude,
                    longitude: store.longitude,
                    distance: distance_km(latitude, longitude, store.latitude, store.longitude),
                })
            })
            .collect();
        Ok(within_radius(hits, radius_km))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn account(id: &str, email: &str, latitude: f64, longitude: f64) -> StoreAccount {
        StoreAccount {
            id: id.to_string(),
            store_name: format!("Store {}", id),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            postcode: "SW1A1AA".to_string(),
            latitude,
            longitude,
        }
    }

    fn refresh(token: &str, store_id: &str, expiry: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord::new(token.to_string(), store_id.to_string(), expiry)
    }

    fn deal(id: &str, store_id: &str, created_at: DateTime<Utc>) -> Deal {
        Deal {
            id: id.to_string(),
            store_id: store_id.to_string(),
            title: format!("Deal {}", id),
            description: None,
            price: 1.5,
            image_url: None,
            expiry_date: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn duplicate_email_leaves_no_trace() {
        let store = MemoryStore::new();
        let expiry = Utc::now() + Duration::days(7);
        store
            .register_store(&account("a", "joe@x.com", 0.0, 0.0), &refresh("t1", "a", expiry))
            .await
            .unwrap();

        let err = store
            .register_store(&account("b", "joe@x.com", 0.0, 0.0), &refresh("t2", "b", expiry))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::DuplicateEmail);
        assert_eq!(store.store_count().await, 1);
        assert!(store.get_refresh_token("t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_with_taken_refresh_token_rolls_back_the_account() {
        let store = MemoryStore::new();
        let expiry = Utc::now() + Duration::days(7);
        store
            .register_store(&account("a", "a@x.com", 0.0, 0.0), &refresh("t1", "a", expiry))
            .await
            .unwrap();

        let err = store
            .register_store(&account("b", "b@x.com", 0.0, 0.0), &refresh("t1", "b", expiry))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::DuplicateToken);
        assert_eq!(store.store_count().await, 1);
        assert!(store.find_store_by_email("b@x.com").await.unwrap().is_none());
        assert!(store.find_store_by_id("b").await.unwrap().is_none());
        assert_eq!(store.get_refresh_token("t1").await.unwrap().unwrap().store_id, "a");
    }

    #[tokio::test]
    async fn duplicate_refresh_token_is_rejected() {
        let store = MemoryStore::new();
        let record = refresh("same", "a", Utc::now() + Duration::days(7));

        store.add_refresh_token(&record).await.unwrap();
        assert_eq!(
            store.add_refresh_token(&record).await,
            Err(StoreError::DuplicateToken)
        );
        assert_eq!(store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn purge_removes_only_expired_tokens() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .add_refresh_token(&refresh("old", "a", now - Duration::seconds(1)))
            .await
            .unwrap();
        store
            .add_refresh_token(&refresh("fresh", "a", now + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(store.purge_expired_refresh_tokens(now).await.unwrap(), 1);
        assert!(store.get_refresh_token("old").await.unwrap().is_none());
        assert!(store.get_refresh_token("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deals_are_listed_newest_first_and_searched_by_distance() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let expiry = now + Duration::days(7);
        // Westminster, Camden (~4km away), Manchester (~260km away).
        store
            .register_store(&account("near", "a@x.com", 51.501, -0.141), &refresh("t1", "near", expiry))
            .await
            .unwrap();
        store
            .register_store(&account("mid", "b@x.com", 51.539, -0.142), &refresh("t2", "mid", expiry))
            .await
            .unwrap();
        store
            .register_store(&account("far", "c@x.com", 53.48, -2.24), &refresh("t3", "far", expiry))
            .await
            .unwrap();

        store.add_deal(&deal("d1", "near", now - Duration::hours(2))).await.unwrap();
        store.add_deal(&deal("d2", "near", now)).await.unwrap();
        store.add_deal(&deal("d3", "mid", now)).await.unwrap();
        store.add_deal(&deal("d4", "far", now)).await.unwrap();

        let mine: Vec<String> = store
            .deals_for_store("near")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(mine, vec!["d2", "d1"]);

        let hits = store.deals_near(51.5, -0.14, 5.0).await.unwrap();
        let stores: Vec<&str> = hits.iter().map(|h| h.deal.store_id.as_str()).collect();
        assert_eq!(stores, vec!["near", "near", "mid"]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[tokio::test]
    async fn deal_for_unknown_store_is_rejected() {
        let store = MemoryStore::new();
        assert!(store.add_deal(&deal("d1", "ghost", Utc::now())).await.is_err());
    }
}
