use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use common::config::{MqAppConfig, StorageConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Jobs processed concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    4
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub token_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkerAppConfig {
    /// Base URL baked into disk-service URLs. The worker never serves them,
    /// but the registry needs it to construct disk services.
    #[serde(default = "default_public_base")]
    pub public_base: String,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: MqAppConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

fn default_public_base() -> String {
    "http://127.0.0.1:3000".into()
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., PANTRY__QUEUE__URL)
            .add_source(Environment::with_prefix("PANTRY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
