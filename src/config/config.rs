use std::fmt;
use std::path::Path;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use super::store::StoreConfig;
use crate::geocoder::GeocoderConfig;

/// Environment variable naming the config file; defaults to `./config.yaml`.
pub const CONFIG_PATH_ENV: &str = "STOREGATE_CONFIG";
/// Prefix for environment overrides, e.g. `STOREGATE_JWT__ACCESS_SECRET`.
pub const ENV_PREFIX: &str = "STOREGATE_";

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub jwt: JWTConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub password: PasswordConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
}

/// Builds the figment used at start-up: the YAML file, then `STOREGATE_*`
/// environment variables on top.
pub fn figment(path: impl AsRef<Path>) -> Figment {
    Figment::new()
        .merge(Yaml::file(path.as_ref()))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
}

/// Extracts a versioned config from any figment.
pub fn extract_config(figment: &Figment) -> Result<ConfigV1, figment::Error> {
    match figment.extract::<Config>()? {
        Config::ConfigV1(c) => Ok(c),
    }
}

/// Load config from `$STOREGATE_CONFIG` (or `./config.yaml`) plus the environment.
pub fn load_config() -> Result<ConfigV1, figment::Error> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "./config.yaml".to_string());
    extract_config(&figment(path))
}

/// Render the JSON schema for the configuration.
pub fn schema_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schema_for!(Config))
}

/// Signing secrets and lifetimes for both token classes.
#[derive(Deserialize, Serialize, Clone, JsonSchema)]
pub struct JWTConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
}

fn default_access_ttl() -> i64 {
    15 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

impl fmt::Debug for JWTConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JWTConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// Attributes of the refresh-token cookie.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct CookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Adds `Secure`. Off by default; turn on behind HTTPS.
    #[serde(default)]
    pub secure: bool,
}

fn default_cookie_name() -> String {
    "refreshToken".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            path: default_cookie_path(),
            secure: false,
        }
    }
}

/// Browser origins allowed to call the API with credentials.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// bcrypt work factor.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct PasswordConfig {
    #[serde(default = "default_cost")]
    pub cost: u32,
}

fn default_cost() -> u32 {
    10
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            cost: default_cost(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::geocoder::GeocoderConfig;

    const MINIMAL: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:5050
jwt:
  access_secret: access
  refresh_secret: refresh
store:
  type: memory
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = extract_config(&Figment::new().merge(Yaml::string(MINIMAL)))
            .expect("config should parse");

        assert_eq!(config.jwt.access_ttl_secs, 900);
        assert_eq!(config.jwt.refresh_ttl_secs, 604_800);
        assert_eq!(config.cookie.name, "refreshToken");
        assert!(!config.cookie.secure);
        assert_eq!(config.password.cost, 10);
        assert_eq!(config.store.purge_interval_secs, 3600);
        assert!(matches!(config.store.backend, StoreBackend::Memory));
        assert!(matches!(config.geocoder, GeocoderConfig::PostcodesIo(_)));
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn missing_secrets_are_rejected() {
        let yaml = r#"
version: "1.0.0"
bind_address: 127.0.0.1:5050
jwt:
  access_secret: access
store:
  type: memory
"#;
        assert!(extract_config(&Figment::new().merge(Yaml::string(yaml))).is_err());
    }

    #[test]
    fn environment_overrides_secrets() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.yaml", MINIMAL)?;
            jail.set_env("STOREGATE_JWT__ACCESS_SECRET", "from-env");

            let config = extract_config(&figment("config.yaml"))?;
            assert_eq!(config.jwt.access_secret, "from-env");
            assert_eq!(config.jwt.refresh_secret, "refresh");
            Ok(())
        });
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = extract_config(&Figment::new().merge(Yaml::string(MINIMAL))).unwrap();
        let rendered = format!("{:?}", config.jwt);
        assert!(!rendered.contains("\"access\""));
        assert!(rendered.contains("<redacted>"));
    }
}
