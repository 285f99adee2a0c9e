use super::manifest::parse_manifest;
use super::processor::{ArchiveProcessor, ArchiveResult};
use crate::config::HttpConfig;
use crate::error::CollectorError;
use crate::store::HashStore;
use crate::topic::TopicResolver;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Aggregated outcome of one manifest check.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub parsed: usize,
    pub malformed_lines: usize,
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// One scheduled tick: fetch the manifest, select new or changed archives of
/// a supported type, and fan each one out to its own pipeline task.
pub struct Coordinator {
    http: reqwest::Client,
    manifest_url: String,
    resolver: Arc<TopicResolver>,
    hash_store: Arc<dyn HashStore>,
    processor: Arc<ArchiveProcessor>,
}

impl Coordinator {
    pub fn new(
        manifest_url: String,
        http_config: &HttpConfig,
        resolver: Arc<TopicResolver>,
        hash_store: Arc<dyn HashStore>,
        processor: Arc<ArchiveProcessor>,
    ) -> Result<Self, CollectorError> {
        let http = reqwest::Client::builder()
            .connect_timeout(http_config.connect_timeout())
            .timeout(http_config.read_timeout())
            .build()?;
        Ok(Self {
            http,
            manifest_url,
            resolver,
            hash_store,
            processor,
        })
    }

    /// Runs one manifest check. A manifest fetch failure surfaces to the
    /// caller; failures of individual archives never do, and never cancel
    /// their siblings.
    pub async fn tick(&self) -> Result<TickSummary, CollectorError> {
        let body = self.fetch_manifest().await?;
        let parsed = parse_manifest(&body);
        if parsed.malformed_lines > 0 {
            warn!(
                count = parsed.malformed_lines,
                "Manifest contained malformed lines"
            );
        }

        let mut summary = TickSummary {
            parsed: parsed.descriptors.len(),
            malformed_lines: parsed.malformed_lines,
            ..TickSummary::default()
        };

        let mut selected = Vec::new();
        for descriptor in parsed.descriptors {
            if !self.resolver.is_supported(&descriptor.url) {
                debug!(url = descriptor.url, "Skipping unsupported archive type");
                continue;
            }
            match self
                .hash_store
                .is_new_or_changed(&descriptor.file_name, &descriptor.expected_hash)
                .await
            {
                Ok(true) => selected.push(descriptor),
                Ok(false) => {
                    debug!(archive = descriptor.file_name, "Archive unchanged, skipping")
                }
                Err(err) => {
                    warn!(archive = descriptor.file_name, %err, "Skipping archive, hash lookup failed")
                }
            }
        }
        summary.selected = selected.len();

        if selected.is_empty() {
            info!("Manifest check found nothing new");
            return Ok(summary);
        }
        info!(count = selected.len(), "Processing new or changed archives");

        let mut pipelines = FuturesUnordered::new();
        for descriptor in selected {
            let processor = self.processor.clone();
            pipelines.push(tokio::spawn(
                async move { processor.process(descriptor).await },
            ));
        }

        while let Some(joined) = pipelines.next().await {
            match joined {
                Ok(ArchiveResult::Success {
                    descriptor,
                    produced_urls,
                }) => {
                    info!(
                        archive = descriptor.file_name,
                        files = produced_urls.len(),
                        "Archive processed"
                    );
                    summary.succeeded += 1;
                }
                Ok(ArchiveResult::Failure {
                    descriptor,
                    message,
                }) => {
                    warn!(archive = descriptor.file_name, message, "Archive failed");
                    summary.failed += 1;
                }
                Err(err) => {
                    warn!(%err, "Archive pipeline task aborted");
                    summary.failed += 1;
                }
            }
        }

        info!(
            selected = summary.selected,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Manifest check finished"
        );
        Ok(summary)
    }

    async fn fetch_manifest(&self) -> Result<String, CollectorError> {
        let manifest_err = |reason: String| CollectorError::Manifest {
            url: self.manifest_url.clone(),
            reason,
        };

        let response = self
            .http
            .get(&self.manifest_url)
            .send()
            .await
            .map_err(|e| manifest_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| manifest_err(e.to_string()))?;

        response.text().await.map_err(|e| manifest_err(e.to_string()))
    }
}
