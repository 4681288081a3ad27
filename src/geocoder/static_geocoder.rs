use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::base::{normalize_postcode, Coordinates, GeocodeError, Geocoder};

/// A fixed postcode table, for development and tests.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct StaticGeocoderConfig {
    #[serde(default)]
    pub postcodes: HashMap<String, Coordinates>,
}

pub struct StaticGeocoder {
    postcodes: HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new(config: &StaticGeocoderConfig) -> Self {
        let postcodes = config
            .postcodes
            .iter()
            .map(|(code, coords)| (normalize_postcode(code), *coords))
            .collect();
        Self { postcodes }
    }
}

#[async_trait::async_trait]
impl Geocoder for StaticGeocoder {
    fn get_name(&self) -> &str {
        "static"
    }

    async fn resolve(&self, postcode: &str) -> Result<Coordinates, GeocodeError> {
        self.postcodes
            .get(&normalize_postcode(postcode))
            .copied()
            .ok_or_else(|| GeocodeError::NotFound(postcode.to_string()))
    }
}
