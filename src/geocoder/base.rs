use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::postcodes_io::{PostcodesIoConfig, PostcodesIoGeocoder};
use super::static_geocoder::{StaticGeocoder, StaticGeocoderConfig};

/// A resolved location.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, JsonSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum GeocodeError {
    /// The postcode is not recognised (or has no coordinates).
    #[error("postcode '{0}' not found")]
    NotFound(String),
    /// The lookup could not be completed at all.
    #[error("geocoder unavailable: {0}")]
    Unavailable(String),
}

/// Configuration for the geocoding collaborator, selected by `type`.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum GeocoderConfig {
    #[serde(rename = "postcodes-io")]
    PostcodesIo(PostcodesIoConfig),
    #[serde(rename = "static")]
    Static(StaticGeocoderConfig),
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig::PostcodesIo(PostcodesIoConfig::default())
    }
}

/// Resolves a postcode to coordinates.
#[async_trait::async_trait]
pub trait Geocoder: Send + Sync {
    fn get_name(&self) -> &str;
    async fn resolve(&self, postcode: &str) -> Result<Coordinates, GeocodeError>;
}

/// Canonical form used for lookups and cache keys: upper case, no whitespace.
pub fn normalize_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Builds the configured geocoder.
pub fn create_geocoder(config: &GeocoderConfig) -> Result<Arc<dyn Geocoder>, String> {
    let geocoder: Arc<dyn Geocoder> = match config {
        GeocoderConfig::PostcodesIo(cfg) => Arc::new(PostcodesIoGeocoder::new(cfg)?),
        GeocoderConfig::Static(cfg) => Arc::new(StaticGeocoder::new(cfg)),
    };
    info!("Using geocoder '{}'", geocoder.get_name());
    Ok(geocoder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_spacing_and_case() {
        assert_eq!(normalize_postcode(" sw1a 1aa "), "SW1A1AA");
        assert_eq!(normalize_postcode("SW1A1AA"), "SW1A1AA");
    }
}
