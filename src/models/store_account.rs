use serde::{Deserialize, Serialize};

/// A registered business. `id` never changes once assigned and `email` is
/// unique across all accounts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoreAccount {
    pub id: String,
    pub store_name: String,
    pub email: String,
    pub password_hash: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// The account as returned to clients: everything but the password hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PublicStore {
    pub id: String,
    pub store_name: String,
    pub email: String,
    pub postcode: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl From<&StoreAccount> for PublicStore {
    fn from(account: &StoreAccount) -> Self {
        PublicStore {
            id: account.id.clone(),
            store_name: account.store_name.clone(),
            email: account.email.clone(),
            postcode: account.postcode.clone(),
            latitude: account.latitude,
            longitude: account.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_view_drops_password_hash() {
        let account = StoreAccount {
            id: "s-1".to_string(),
            store_name: "Joe's Deli".to_string(),
            email: "joe@x.com".to_string(),
            password_hash: "$2b$10$hash".to_string(),
            postcode: "SW1A1AA".to_string(),
            latitude: 51.5,
            longitude: -0.14,
        };

        let json = serde_json::to_value(PublicStore::from(&account)).unwrap();
        assert_eq!(json["email"], "joe@x.com");
        assert!(json.get("password_hash").is_none());
    }
}
