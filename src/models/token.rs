use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The server-side record of an issued refresh token.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub store_id: String,
    pub expiry: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(token: String, store_id: String, expiry: DateTime<Utc>) -> Self {
        RefreshTokenRecord {
            token,
            store_id,
            expiry,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry
    }
}
