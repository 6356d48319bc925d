use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::services::rate_limiter::RateLimitQuota;

const ENV_PREFIX: &str = "ACTIVITY_INDEXER";

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_block_range() -> u64 {
    500
}

fn default_max_requests() -> u32 {
    20
}

fn default_window_ms() -> u64 {
    1_000
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl From<RateLimitConfig> for RateLimitQuota {
    fn from(config: RateLimitConfig) -> Self {
        RateLimitQuota::new(
            config.max_requests,
            std::time::Duration::from_millis(config.window_ms),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub rpc_provider: String,
    pub contract_address: String,
    /// Events are only logged when no database is configured.
    #[serde(default)]
    pub database_url: Option<String>,
    /// First block of the historical catch-up. Live listening starts at the
    /// head of the chain when unset.
    #[serde(default)]
    pub start_block: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Loads the YAML file at `config_path` (optional), then applies
    /// `ACTIVITY_INDEXER_*` environment overrides, e.g.
    /// `ACTIVITY_INDEXER_RATE_LIMIT__MAX_REQUESTS=10`.
    pub fn load(config_path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(config_path, FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_yaml(yaml: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::build(Config::builder().add_source(File::from_str(yaml, FileFormat::Yaml)))
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = from_yaml(
            r#"
rpc_provider: "http://localhost:8545"
contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#,
        )
        .unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.start_block, None);
        assert_eq!(config.poll_interval_ms, 2_000);
        assert_eq!(config.max_block_range, 500);
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn test_rate_limit_section() {
        let config = from_yaml(
            r#"
rpc_provider: "http://localhost:8545"
contract_address: "0x5FbDB2315678afecb367f032d93F642f64180aa3"
start_block: 1200
rate_limit:
  max_requests: 5
"#,
        )
        .unwrap();

        assert_eq!(config.start_block, Some(1200));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_ms, 1_000);

        let quota = RateLimitQuota::from(config.rate_limit);
        assert_eq!(quota.max_requests, 5);
    }

    #[test]
    fn test_missing_rpc_provider_is_an_error() {
        let result = from_yaml("contract_address: \"0x00\"\n");
        assert!(result.is_err());
    }
}
