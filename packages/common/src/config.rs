use serde::Deserialize;

/// Which content store implementation to construct.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// S3-compatible object storage. Requires the `object-storage` feature.
    #[default]
    S3,
    /// In-process store. Objects vanish on restart.
    Memory,
}

/// Object storage connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Host and optional port, without scheme. Default: "localhost:9000".
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Default: "filevault".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Whether the endpoint speaks HTTPS. Default: false.
    #[serde(default)]
    pub use_ssl: bool,
}

fn default_endpoint() -> String {
    "localhost:9000".into()
}
fn default_bucket() -> String {
    "filevault".into()
}
fn default_region() -> String {
    "us-east-1".into()
}

impl ObjectStoreConfig {
    /// Endpoint with scheme, e.g. `http://localhost:9000`.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{scheme}://{}", self.endpoint.trim_end_matches('/'))
    }

    /// Base of the clean public URL for objects in the bucket.
    pub fn public_base_url(&self) -> String {
        format!("{}/{}", self.endpoint_url(), self.bucket)
    }
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            endpoint: default_endpoint(),
            bucket: default_bucket(),
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
            use_ssl: false,
        }
    }
}
