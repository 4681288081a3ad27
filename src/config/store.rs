use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::mongodb_store::MongoDBConfig;

/// Where store accounts, refresh tokens and deals live.
/// - backend: the actual store backend, tagged by `type`.
/// - purge_interval_secs: how often expired refresh tokens are swept; 0 disables the sweep.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub backend: StoreBackend,
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_purge_interval() -> u64 {
    3600
}

/// The existing store backends. We differentiate them via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum StoreBackend {
    /// Process-local storage; everything is lost on restart.
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "mongo")]
    MongoDB(MongoDBConfig),
}
