use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Scratch area for downloaded archives and per-archive extraction dirs.
    pub download_dir: PathBuf,
    /// Absolute URL of the manifest listing the latest translation archives.
    pub manifest_url: String,
    pub object_store: ObjectStoreConfig,
    pub bus: BusConfig,
    pub kv: KvConfig,
    /// TTL for committed archive hashes.
    #[serde(default = "default_hash_ttl_secs")]
    pub hash_ttl_secs: u64,
    /// TTL for per-file delivery status records; caps the retry window.
    #[serde(default = "default_status_ttl_secs")]
    pub status_ttl_secs: u64,
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    pub fn hash_ttl(&self) -> Duration {
        Duration::from_secs(self.hash_ttl_secs)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectStoreConfig {
    /// Endpoint of the S3-compatible store, e.g. `http://minio:9000`.
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub bootstrap_servers: String,
    /// Destination topic for `*.translation.export.CSV.zip` archives.
    pub event_topic: String,
    /// Destination topic for `*.translation.mentions.CSV.zip` archives.
    pub mention_topic: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KvConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub retry_period_ms: u64,
    pub retry_max_period_ms: u64,
    pub retry_max_attempts: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 120,
            read_timeout_secs: 120,
            retry_period_ms: 1000,
            retry_max_period_ms: 30000,
            retry_max_attempts: 3,
        }
    }
}

impl HttpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

fn default_hash_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_status_ttl_secs() -> u64 {
    60 * 60
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_retry_interval_secs() -> u64 {
    300
}

fn default_region() -> String {
    "us-east-1".to_string()
}
