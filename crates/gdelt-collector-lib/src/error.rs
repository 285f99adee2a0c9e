use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch manifest from {url}: {reason}")]
    Manifest { url: String, reason: String },

    #[error("Failed to download {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("hash mismatch: {actual} != {expected}")]
    Integrity {
        archive: String,
        expected: String,
        actual: String,
    },

    #[error("Archive entry escapes the extraction root: {entry}")]
    ZipTraversal { entry: String },

    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: String, reason: String },

    #[error("Object storage failure for {object}: {reason}")]
    Storage { object: String, reason: String },

    #[error("No topic configured for archive {archive}")]
    Classification { archive: String },

    #[error("Failed to publish to {topic}: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Extracted event listener is not running")]
    EventBusClosed,

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Unexpected error: {0}")]
    Unexpected(#[from] eyre::Report),
}
