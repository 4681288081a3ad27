use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::base::{within_radius, Store, StoreError};
use crate::models::deal::distance_km;
use crate::models::{Deal, NearbyDeal, RefreshTokenRecord, StoreAccount};

const DUPLICATE_KEY: i32 = 11000;

/// The config struct for MongoDB connections.
/// Contains the URI and database name.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone)]
pub struct MongoDBConfig {
    pub uri: String,
    pub database: String,
}

/// A concrete `Store` implementation that uses MongoDB.
///
/// - `store_collection`: accounts, `_id` = store id, unique index on `email`
/// - `token_collection`: refresh tokens, `_id` = token value
/// - `deal_collection`: deals, indexed by `(store_id, created_at)`
pub struct MongoDBStore {
    store_collection: Collection<StoreDocument>,
    token_collection: Collection<RefreshTokenDocument>,
    deal_collection: Collection<DealDocument>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct StoreDocument {
    _id: String,
    store_name: String,
    email: String,
    password_hash: String,
    postcode: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct RefreshTokenDocument {
    _id: String,
    store_id: String,
    expiry: bson::DateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct DealDocument {
    _id: String,
    store_id: String,
    title: String,
    description: Option<String>,
    price: f64,
    image_url: Option<String>,
    expiry_date: Option<String>,
    created_at: bson::DateTime,
}

fn to_bson_date(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_date(at: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}

fn backend(context: &str) -> impl FnOnce(mongodb::error::Error) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("{}: {}", context, e))
}

impl MongoDBStore {
    /// Creates a new `MongoDBStore` from the given config.
    /// It initializes client connections, sets up indexes, etc.
    pub async fn new(config: &MongoDBConfig) -> Result<Self, String> {
        info!("Connecting to MongoDB database '{}'", config.database);

        let mut client_options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|e| format!("Failed to parse MongoDB URI: {}", e))?;
        client_options.app_name = Some("storegate".to_string());

        let client = Client::with_options(client_options)
            .map_err(|e| format!("Failed to create MongoDB client: {}", e))?;

        let database = client.database(&config.database);
        let store_collection = database.collection::<StoreDocument>("stores");
        let token_collection = database.collection::<RefreshTokenDocument>("refresh_tokens");
        let deal_collection = database.collection::<DealDocument>("deals");

        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        store_collection
            .create_index(unique_email, None)
            .await
            .map_err(|e| format!("Failed to create unique index on email: {}", e))?;

        let by_expiry = IndexModel::builder().keys(doc! { "expiry": 1 }).build();
        token_collection
            .create_index(by_expiry, None)
            .await
            .map_err(|e| format!("Failed to create index on refresh token expiry: {}", e))?;

        let by_store = IndexModel::builder()
            .keys(doc! { "store_id": 1, "created_at": -1 })
            .build();
        deal_collection
            .create_index(by_store, None)
            .await
            .map_err(|e| format!("Failed to create index on deals: {}", e))?;

        info!("MongoDB connection established successfully.");
        Ok(Self {
            store_collection,
            token_collection,
            deal_collection,
        })
    }

    fn account_to_doc(account: &StoreAccount) -> StoreDocument {
        StoreDocument {
            _id: account.id.clone(),
            store_name: account.store_name.clone(),
            email: account.email.clone(),
            password_hash: account.password_hash.clone(),
            postcode: account.postcode.clone(),
            latitude: account.latitude,
            longitude: account.longitude,
        }
    }

    fn doc_to_account(doc: StoreDocument) -> StoreAccount {
        StoreAccount {
            id: doc._id,
            store_name: doc.store_name,
            email: doc.email,
            password_hash: doc.password_hash,
            postcode: doc.postcode,
            latitude: doc.latitude,
            longitude: doc.longitude,
        }
    }

    fn record_to_doc(record: &RefreshTokenRecord) -> RefreshTokenDocument {
        RefreshTokenDocument {
            _id: record.token.clone(),
            store_id: record.store_id.clone(),
            expiry: to_bson_date(record.expiry),
        }
    }

    fn doc_to_record(doc: RefreshTokenDocument) -> RefreshTokenRecord {
        RefreshTokenRecord::new(doc._id, doc.store_id, from_bson_date(doc.expiry))
    }

    fn deal_to_doc(deal: &Deal) -> DealDocument {
        DealDocument {
            _id: deal.id.clone(),
            store_id: deal.store_id.clone(),
            title: deal.title.clone(),
            description: deal.description.clone(),
            price: deal.price,
            image_url: deal.image_url.clone(),
            expiry_date: deal.expiry_date.clone(),
            created_at: to_bson_date(deal.created_at),
        }
    }

    fn doc_to_deal(doc: DealDocument) -> Deal {
        Deal {
            id: doc._id,
            store_id: doc.store_id,
            title: doc.title,
            description: doc.description,
            price: doc.price,
            image_url: doc.image_url,
            expiry_date: doc.expiry_date,
            created_at: from_bson_date(doc.created_at),
        }
    }

    async fn insert_refresh(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        self.token_collection
            .insert_one(Self::record_to_doc(record), None)
            .await
            .map(|_| ())
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::DuplicateToken
                } else {
                    StoreError::Backend(format!("Failed to insert refresh token: {}", e))
                }
            })
    }
}

#[async_trait]
impl Store for MongoDBStore {
    fn get_name(&self) -> &str {
        "mongo"
    }

    /// Standalone MongoDB deployments have no multi-document transactions, so
    /// the account insert is undone by hand if the refresh token cannot be stored.
    async fn register_store(
        &self,
        account: &StoreAccount,
        refresh: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        self.store_collection
            .insert_one(Self::account_to_doc(account), None)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    StoreError::DuplicateEmail
                } else {
                    StoreError::Backend(format!("Failed to insert store: {}", e))
                }
            })?;

        if let Err(insert_error) = self.insert_refresh(refresh).await {
            warn!(
                "Refresh token insert failed for new store '{}'; removing account",
                account.id
            );
            self.store_collection
                .delete_one(doc! { "_id": account.id.as_str() }, None)
                .await
                .map_err(backend("Failed to roll back store insert"))?;
            return Err(insert_error);
        }

        debug!("Registered store '{}' in MongoDB", account.id);
        Ok(())
    }

    async fn find_store_by_email(&self, email: &str) -> Result<Option<StoreAccount>, StoreError> {
        let doc = self
            .store_collection
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(backend("Failed to query store by email"))?;
        Ok(doc.map(Self::doc_to_account))
    }

    async fn find_store_by_id(&self, id: &str) -> Result<Option<StoreAccount>, StoreError> {
        let doc = self
            .store_collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(backend("Failed to query store by id"))?;
        Ok(doc.map(Self::doc_to_account))
    }

    async fn add_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        self.insert_refresh(record).await
    }

    async fn get_refresh_token(
        &self,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let doc = self
            .token_collection
            .find_one(doc! { "_id": token }, None)
            .await
            .map_err(backend("Failed to query refresh token"))?;
        Ok(doc.map(Self::doc_to_record))
    }

    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = self
            .token_collection
            .delete_many(doc! { "expiry": { "$lte": to_bson_date(now) } }, None)
            .await
            .map_err(backend("Failed to purge refresh tokens"))?;
        Ok(result.deleted_count)
    }

    async fn add_deal(&self, deal: &Deal) -> Result<(), StoreError> {
        self.deal_collection
            .insert_one(Self::deal_to_doc(deal), None)
            .await
            .map_err(backend("Failed to insert deal"))?;
        Ok(())
    }

    async fn deals_for_store(&self, store_id: &str) -> Result<Vec<Deal>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        let docs: Vec<DealDocument> = self
            .deal_collection
            .find(doc! { "store_id": store_id }, options)
            .await
            .map_err(backend("Failed to list deals"))?
            .try_collect()
            .await
            .map_err(backend("Failed to read deal document"))?;
        Ok(docs.into_iter().map(Self::doc_to_deal).collect())
    }

    async fn deals_near(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Vec<NearbyDeal>, StoreError> {
        // Distance is computed here rather than with $geoNear so the store
        // documents keep plain latitude/longitude fields.
        let stores: Vec<StoreDocument> = self
            .store_collection
            .find(doc! {}, None)
            .await
            .map_err(backend("Failed to list stores"))?
            .try_collect()
            .await
            .map_err(backend("Failed to read store document"))?;

        let nearby: HashMap<String, (StoreDocument, f64)> = stores
            .into_iter()
            .filter_map(|store| {
                let distance = distance_km(latitude, longitude, store.latitude, store.longitude);
                (distance < radius_km).then(|| (store._id.clone(), (store, distance)))
            })
            .collect();
        if nearby.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = nearby.keys().cloned().collect();
        let deals: Vec<DealDocument> = self
            .deal_collection
            .find(doc! { "store_id": { "$in": ids } }, None)
            .await
            .map_err(backend("Failed to search deals"))?
            .try_collect()
            .await
            .map_err(backend("Failed to read deal document"))?;

        let hits = deals
            .into_iter()
            .filter_map(|doc| {
                let (store, distance) = nearby.get(&doc.store_id)?;
                Some(NearbyDeal {
                    store_name: store.store_name.clone(),
                    latitude: store.latitude,
                    longitude: store.longitude,
                    distance: *distance,
                    deal: Self::doc_to_deal(doc),
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

    #[test]
    fn account_document_round_trip_keeps_id_and_hash() {
        let account = StoreAccount {
            id: "store-1".to_string(),
            store_name: "Joe's Deli".to_string(),
            email: "joe@x.com".to_string(),
            password_hash: "$2b$10$abc".to_string(),
            postcode: "SW1A1AA".to_string(),
            latitude: 51.5,
            longitude: -0.14,
        };
        let doc = MongoDBStore::account_to_doc(&account);
        assert_eq!(doc._id, "store-1");
        assert_eq!(MongoDBStore::doc_to_account(doc), account);
    }

    #[test]
    fn refresh_expiry_survives_millisecond_precision() {
        let expiry = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let record = RefreshTokenRecord::new("tok".into(), "store-1".into(), expiry);
        let back = MongoDBStore::doc_to_record(MongoDBStore::record_to_doc(&record));
        assert_eq!(back, record);
        assert!(back.is_expired(expiry + Duration::milliseconds(1)));
    }
}
