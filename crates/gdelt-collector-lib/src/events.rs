use crate::error::CollectorError;
use crate::pipeline::ArchiveDescriptor;
use crate::publish::Publisher;
use crate::store::StatusStore;
use crate::topic::TopicResolver;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Emitted exactly once per successfully processed archive, after all of its
/// members have been uploaded and before its hash is committed.
#[derive(Debug, Clone)]
pub struct ExtractedEvent {
    pub descriptor: ArchiveDescriptor,
    pub produced_urls: Vec<String>,
}

/// In-process dispatch of extracted events to the listener task. Cheap to
/// clone; emission never blocks the emitting pipeline.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<ExtractedEvent>,
}

impl EventBus {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ExtractedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ExtractedEvent) -> Result<(), CollectorError> {
        self.tx
            .send(event)
            .map_err(|_| CollectorError::EventBusClosed)
    }
}

/// Drains extracted events: resolves the destination topic, registers each
/// produced URL for delivery tracking, and fires a publish per URL. Event
/// ordering is not guaranteed relative to the emitting pipelines.
pub fn spawn_listener(
    mut rx: mpsc::UnboundedReceiver<ExtractedEvent>,
    resolver: Arc<TopicResolver>,
    status_store: Arc<dyn StatusStore>,
    publisher: Arc<dyn Publisher>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            handle_event(event, &resolver, &status_store, &publisher).await;
        }
    })
}

async fn handle_event(
    event: ExtractedEvent,
    resolver: &Arc<TopicResolver>,
    status_store: &Arc<dyn StatusStore>,
    publisher: &Arc<dyn Publisher>,
) {
    let archive = &event.descriptor.file_name;
    let topic = match resolver.resolve(archive) {
        Ok(topic) => topic.to_string(),
        Err(err) => {
            warn!(archive, %err, "Dropping extracted event, archive type unknown");
            return;
        }
    };

    info!(
        archive,
        topic,
        files = event.produced_urls.len(),
        "Handling extracted event"
    );
    for url in &event.produced_urls {
        // A status write failure is non-fatal: the send below may still
        // succeed, only the retry sweep loses sight of this URL.
        if let Err(err) = status_store.register(archive, url).await {
            warn!(url, %err, "Failed to register delivery status");
        }

        let publisher = publisher.clone();
        let topic = topic.clone();
        let url = url.clone();
        tokio::spawn(async move {
            if let Err(err) = publisher.send(&topic, &url).await {
                warn!(url, %err, "Publish failed, leaving record unsent");
            }
        });
    }
}
