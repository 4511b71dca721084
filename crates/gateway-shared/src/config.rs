//! Layered application configuration: embedded defaults, an environment-specific
//! file, then `GATEWAY_`-prefixed environment variables, in that order of
//! increasing precedence.

use serde::Deserialize;
use std::time::Duration;

const DEFAULTS_TOML: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub catalogue: CatalogueConfig,
    pub scoring: ScoringConfig,
    pub queue: QueueConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub shutdown_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub decomposition_model: String,
    pub fallback_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueConfig {
    pub ttl_hours: u64,
}

impl CatalogueConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours * 3600)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub blob_root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl AppConfig {
    /// Load configuration from embedded defaults, an optional
    /// `config/<GATEWAY_ENV>.toml` override, and `GATEWAY_`-prefixed env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("GATEWAY_ENV").unwrap_or_else(|_| "development".to_string());

        let builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS_TOML, config::FileFormat::Toml))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(config::Environment::with_prefix("GATEWAY").separator("__"));

        builder.build()?.try_deserialize()
    }
}
