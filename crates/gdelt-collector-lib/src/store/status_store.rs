use crate::error::CollectorError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const STATUS_KEY_PREFIX: &str = "gdelt:file:info:";

/// Delivery status of one uploaded object URL. `sent` flips to true only
/// after the broker acknowledges a publish attempt for the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSendRecord {
    pub archive_file_name: String,
    pub file_url: String,
    pub sent: bool,
}

/// Persistent per-URL delivery status, keyed by object URL, with a bounded
/// TTL that caps the retry window.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Upserts a record with `sent = false`.
    async fn register(
        &self,
        archive_file_name: &str,
        file_url: &str,
    ) -> Result<bool, CollectorError>;

    /// Flips an existing record to `sent = true` and resets its TTL. Returns
    /// false without writing when no record exists (no resurrection of
    /// expired keys).
    async fn mark_sent(&self, file_url: &str) -> Result<bool, CollectorError>;

    async fn get(&self, file_url: &str) -> Result<Option<FileSendRecord>, CollectorError>;

    /// Best-effort snapshot of all records with `sent = false`, via a prefix
    /// sweep. Not a transactional view.
    async fn pending(&self) -> Result<Vec<FileSendRecord>, CollectorError>;
}

pub struct RedisStatusStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisStatusStore {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    fn key(file_url: &str) -> String {
        format!("{}{}", STATUS_KEY_PREFIX, file_url)
    }

    async fn write(&self, record: &FileSendRecord) -> Result<(), CollectorError> {
        let mut conn = self.conn.clone();
        let payload = serde_json::to_string(record)?;
        let _: () = conn
            .set_ex(Self::key(&record.file_url), payload, self.ttl.as_secs())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn register(
        &self,
        archive_file_name: &str,
        file_url: &str,
    ) -> Result<bool, CollectorError> {
        let record = FileSendRecord {
            archive_file_name: archive_file_name.to_string(),
            file_url: file_url.to_string(),
            sent: false,
        };
        self.write(&record).await?;
        Ok(true)
    }

    async fn mark_sent(&self, file_url: &str) -> Result<bool, CollectorError> {
        let Some(mut record) = self.get(file_url).await? else {
            return Ok(false);
        };
        record.sent = true;
        self.write(&record).await?;
        Ok(true)
    }

    async fn get(&self, file_url: &str) -> Result<Option<FileSendRecord>, CollectorError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(Self::key(file_url)).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn pending(&self) -> Result<Vec<FileSendRecord>, CollectorError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> = conn
                .scan_match(format!("{}*", STATUS_KEY_PREFIX))
                .await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut records = Vec::new();
        for key in keys {
            let mut conn = self.conn.clone();
            let payload: Option<String> = conn.get(&key).await?;
            let Some(payload) = payload else {
                // Expired between the scan and the read.
                continue;
            };
            match serde_json::from_str::<FileSendRecord>(&payload) {
                Ok(record) if !record.sent => records.push(record),
                Ok(_) => {}
                Err(err) => {
                    warn!(key, %err, "Skipping undecodable delivery status record");
                }
            }
        }
        Ok(records)
    }
}
