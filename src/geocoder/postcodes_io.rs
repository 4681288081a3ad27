use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[allow(unused_imports)]
use cached::proc_macro::cached;

#[allow(unused_imports)]
use super::base::normalize_postcode;
use super::base::{Coordinates, GeocodeError, Geocoder};

/// Config for the postcodes.io lookup service.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct PostcodesIoConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_timeout")]
    pub timeout_in_ms: u64,
}

fn default_uri() -> String {
    "https://api.postcodes.io".to_string()
}

fn default_timeout() -> u64 {
    5000
}

impl Default for PostcodesIoConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            timeout_in_ms: default_timeout(),
        }
    }
}

/// Looks postcodes up with `GET {uri}/postcodes/{postcode}`.
pub struct PostcodesIoGeocoder {
    uri: String,
    client: reqwest::Client,
}

impl PostcodesIoGeocoder {
    pub fn new(config: &PostcodesIoConfig) -> Result<Self, String> {
        info!("Creating postcodes.io geocoder against '{}'", config.uri);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .build()
            .map_err(|e| format!("Failed to build geocoder HTTP client: {}", e))?;
        Ok(Self {
            uri: config.uri.clone(),
            client,
        })
    }
}

#[async_trait::async_trait]
impl Geocoder for PostcodesIoGeocoder {
    fn get_name(&self) -> &str {
        "postcodes-io"
    }

    async fn resolve(&self, postcode: &str) -> Result<Coordinates, GeocodeError> {
        lookup(&self.client, &self.uri, postcode).await
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    status: u16,
    result: Option<LookupResult>,
}

#[derive(Deserialize)]
struct LookupResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Only successful lookups are cached; postcodes do not move.
#[cfg_attr(
    not(test),
    cached(
        time = 86400,
        result = true,
        key = "String",
        convert = r#"{ format!("{}|{}", uri, normalize_postcode(postcode)) }"#
    )
)]
async fn lookup(
    client: &reqwest::Client,
    uri: &str,
    postcode: &str,
) -> Result<Coordinates, GeocodeError> {
    let mut url = reqwest::Url::parse(uri)
        .map_err(|e| GeocodeError::Unavailable(format!("Invalid geocoder URI: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| GeocodeError::Unavailable("Geocoder URI cannot be a base".to_string()))?
        .pop_if_empty()
        .push("postcodes")
        .push(postcode.trim());

    debug!("Sending postcode lookup to: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| GeocodeError::Unavailable(format!("Error sending request: {}", e)))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(GeocodeError::NotFound(postcode.to_string()));
    }
    if !status.is_success() {
        return Err(GeocodeError::Unavailable(format!(
            "Unexpected status code: {}",
            status
        )));
    }

    let body: LookupResponse = response
        .json()
        .await
        .map_err(|e| GeocodeError::Unavailable(format!("Error parsing JSON: {}", e)))?;
    if body.status != 200 {
        return Err(GeocodeError::NotFound(postcode.to_string()));
    }

    match body.result {
        Some(LookupResult {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }) => Ok(Coordinates {
            latitude,
            longitude,
        }),
        _ => Err(GeocodeError::NotFound(postcode.to_string())),
    }
}
