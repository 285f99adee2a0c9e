use crate::error::CollectorError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::Duration;

const HASH_KEY_PREFIX: &str = "gdelt:archive:hash:";

/// Persistent mapping of archive name to the last committed archive hash.
///
/// An entry exists for an archive only if at least one pipeline run has
/// delivered all of that archive's derived objects to the object store.
#[async_trait]
pub trait HashStore: Send + Sync {
    async fn stored(&self, archive_name: &str) -> Result<Option<String>, CollectorError>;

    async fn put(&self, archive_name: &str, hash: &str) -> Result<(), CollectorError>;

    /// True iff the stored hash differs from `hash`, including the absent case.
    async fn is_new_or_changed(
        &self,
        archive_name: &str,
        hash: &str,
    ) -> Result<bool, CollectorError> {
        Ok(self.stored(archive_name).await?.as_deref() != Some(hash))
    }
}

pub struct RedisHashStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisHashStore {
    pub fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }

    fn key(archive_name: &str) -> String {
        format!("{}{}", HASH_KEY_PREFIX, archive_name)
    }
}

#[async_trait]
impl HashStore for RedisHashStore {
    async fn stored(&self, archive_name: &str) -> Result<Option<String>, CollectorError> {
        let mut conn = self.conn.clone();
        let stored: Option<String> = conn.get(Self::key(archive_name)).await?;
        Ok(stored)
    }

    async fn put(&self, archive_name: &str, hash: &str) -> Result<(), CollectorError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(archive_name), hash, self.ttl.as_secs())
            .await?;
        Ok(())
    }
}
