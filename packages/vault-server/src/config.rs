use std::time::Duration;

use common::config::ObjectStoreConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const MB: i64 = 1024 * 1024;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
    /// Prefix prepended to share paths, e.g. `https://vault.example.com`.
    /// Empty means share links are returned as bare paths.
    #[serde(default)]
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Vault behaviour knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Quota given to lazily provisioned users. Default: 100.
    #[serde(default = "default_quota_mb")]
    pub default_quota_mb: i64,
    /// Upper bound accepted by the admin quota endpoint. Default: 10240.
    #[serde(default = "default_max_quota_mb")]
    pub max_quota_mb: i64,
    /// Lifetime of presigned upload URLs. Default: 3600.
    #[serde(default = "default_upload_url_ttl_secs")]
    pub upload_url_ttl_secs: u64,
    /// Lifetime of presigned download URLs for private files. Default: 60.
    #[serde(default = "default_download_url_ttl_secs")]
    pub download_url_ttl_secs: u64,
    /// Maximum number of items per batch request. Default: 10.
    #[serde(default = "default_batch_max_items")]
    pub batch_max_items: usize,
    /// Length of generated share ids. Default: 8.
    #[serde(default = "default_share_id_length")]
    pub share_id_length: usize,
}

fn default_quota_mb() -> i64 {
    100
}
fn default_max_quota_mb() -> i64 {
    10240
}
fn default_upload_url_ttl_secs() -> u64 {
    3600
}
fn default_download_url_ttl_secs() -> u64 {
    60
}
fn default_batch_max_items() -> usize {
    10
}
fn default_share_id_length() -> usize {
    8
}

impl StorageConfig {
    pub fn default_quota_bytes(&self) -> i64 {
        self.default_quota_mb.saturating_mul(MB)
    }

    pub fn max_quota_bytes(&self) -> i64 {
        self.max_quota_mb.saturating_mul(MB)
    }

    pub fn upload_url_ttl(&self) -> Duration {
        Duration::from_secs(self.upload_url_ttl_secs)
    }

    pub fn download_url_ttl(&self) -> Duration {
        Duration::from_secs(self.download_url_ttl_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_quota_mb: default_quota_mb(),
            max_quota_mb: default_max_quota_mb(),
            upload_url_ttl_secs: default_upload_url_ttl_secs(),
            download_url_ttl_secs: default_download_url_ttl_secs(),
            batch_max_items: default_batch_max_items(),
            share_id_length: default_share_id_length(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., VAULT__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("VAULT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
