use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// An offer published by a store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Deal {
    pub id: String,
    pub store_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub expiry_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields a store supplies when publishing a deal.
#[derive(Debug, Clone)]
pub struct NewDeal {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub image_url: Option<String>,
    pub expiry_date: Option<String>,
}

/// A search hit: the deal plus where its store is and how far away.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NearbyDeal {
    #[serde(flatten)]
    pub deal: Deal,
    pub store_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Kilometres from the search point.
    pub distance: f64,
}

/// Great-circle distance in kilometres (spherical law of cosines).
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());
    let delta_lng = (lng2 - lng1).to_radians();
    let cos_angle = lat1.cos() * lat2.cos() * delta_lng.cos() + lat1.sin() * lat2.sin();
    // Rounding can push identical points just past 1.0.
    EARTH_RADIUS_KM * cos_angle.clamp(-1.0, 1.0).acos()
}
