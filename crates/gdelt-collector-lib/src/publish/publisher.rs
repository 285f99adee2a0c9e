use crate::error::CollectorError;
use crate::store::StatusStore;
use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sends object URLs to the message bus. `send` resolves on broker
/// acknowledgment; delivery is at-least-once with idempotent-producer
/// semantics at the bus layer.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn send(&self, topic: &str, url: &str) -> Result<(), CollectorError>;
}

pub struct KafkaPublisher {
    producer: FutureProducer,
    status_store: Arc<dyn StatusStore>,
}

impl KafkaPublisher {
    pub fn new(
        bootstrap_servers: &str,
        status_store: Arc<dyn StatusStore>,
    ) -> Result<Self, CollectorError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("enable.idempotence", "true")
            .set("message.timeout.ms", "30000")
            .create()?;
        Ok(Self {
            producer,
            status_store,
        })
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn send(&self, topic: &str, url: &str) -> Result<(), CollectorError> {
        let record = FutureRecord::<(), _>::to(topic).payload(url);

        match self.producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                debug!(topic, url, partition, offset, "Broker acknowledged");
                // Status failures after the ack are non-fatal; the record
                // either expires or is corrected by a later retry send.
                if let Err(err) = self.status_store.mark_sent(url).await {
                    warn!(url, %err, "Failed to mark delivery status as sent");
                }
                Ok(())
            }
            Err((err, _message)) => Err(CollectorError::Publish {
                topic: topic.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}
