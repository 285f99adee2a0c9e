use super::Publisher;
use crate::store::StatusStore;
use crate::topic::TopicResolver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Periodic sweep of unacknowledged delivery records. Re-sends every pending
/// URL without de-duplication; idempotent-producer semantics downstream bear
/// the cost, and record TTLs bound the retry window.
pub struct RetryScheduler {
    status_store: Arc<dyn StatusStore>,
    resolver: Arc<TopicResolver>,
    publisher: Arc<dyn Publisher>,
}

impl RetryScheduler {
    pub fn new(
        status_store: Arc<dyn StatusStore>,
        resolver: Arc<TopicResolver>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            status_store,
            resolver,
            publisher,
        }
    }

    pub async fn sweep(&self) {
        let records = match self.status_store.pending().await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "Failed to read pending delivery records");
                return;
            }
        };
        if records.is_empty() {
            debug!("No unacknowledged file URLs");
            return;
        }

        info!(count = records.len(), "Re-sending unacknowledged file URLs");
        for record in records {
            let topic = match self.resolver.resolve(&record.archive_file_name) {
                Ok(topic) => topic.to_string(),
                Err(err) => {
                    warn!(archive = record.archive_file_name, %err, "Cannot re-send, archive type unknown");
                    continue;
                }
            };

            let publisher = self.publisher.clone();
            tokio::spawn(async move {
                if let Err(err) = publisher.send(&topic, &record.file_url).await {
                    warn!(url = record.file_url, %err, "Retry publish failed");
                }
            });
        }
    }
}
