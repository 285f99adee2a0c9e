use super::manifest::ArchiveDescriptor;
use crate::error::CollectorError;
use crate::events::{EventBus, ExtractedEvent};
use crate::fileops::{Downloader, ensure_dir, extract_zip, md5_hex};
use crate::storage::ObjectStore;
use crate::store::HashStore;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Outcome of one archive pipeline run, aggregated by the coordinator.
#[derive(Debug)]
pub enum ArchiveResult {
    Success {
        descriptor: ArchiveDescriptor,
        produced_urls: Vec<String>,
    },
    Failure {
        descriptor: ArchiveDescriptor,
        message: String,
    },
}

/// Per-archive pipeline: fetch, verify, extract, upload, announce, commit,
/// clean up. Stateless across archives; every archive runs on its own task
/// with its own download file and scratch directory.
pub struct ArchiveProcessor {
    downloader: Downloader,
    hash_store: Arc<dyn HashStore>,
    object_store: Arc<dyn ObjectStore>,
    event_bus: EventBus,
    download_dir: PathBuf,
}

impl ArchiveProcessor {
    pub fn new(
        downloader: Downloader,
        hash_store: Arc<dyn HashStore>,
        object_store: Arc<dyn ObjectStore>,
        event_bus: EventBus,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            downloader,
            hash_store,
            object_store,
            event_bus,
            download_dir,
        }
    }

    pub async fn process(&self, descriptor: ArchiveDescriptor) -> ArchiveResult {
        info!(archive = descriptor.file_name, url = descriptor.url, "Processing archive");
        match self.run_pipeline(&descriptor).await {
            Ok(produced_urls) => ArchiveResult::Success {
                descriptor,
                produced_urls,
            },
            Err(err) => {
                let message = err.to_string();
                warn!(archive = descriptor.file_name, %err, "Archive pipeline failed");
                ArchiveResult::Failure {
                    descriptor,
                    message,
                }
            }
        }
    }

    async fn run_pipeline(
        &self,
        descriptor: &ArchiveDescriptor,
    ) -> Result<Vec<String>, CollectorError> {
        ensure_dir(&self.download_dir)?;

        // The scratch dir guard removes the extraction tree on every exit
        // path, including cancellation mid-pipeline.
        let scratch = tempfile::Builder::new()
            .prefix(&format!(
                "{}-{}",
                descriptor.file_name,
                monotonic_timestamp_millis()
            ))
            .tempdir_in(&self.download_dir)?;

        let archive_path = self.download_dir.join(&descriptor.file_name);
        let result = self
            .fetch_verify_publish(descriptor, &archive_path, scratch.path())
            .await;

        if let Err(err) = scratch.close() {
            warn!(archive = descriptor.file_name, %err, "Failed to remove scratch directory");
        }
        result
    }

    async fn fetch_verify_publish(
        &self,
        descriptor: &ArchiveDescriptor,
        archive_path: &Path,
        scratch_dir: &Path,
    ) -> Result<Vec<String>, CollectorError> {
        self.downloader
            .download(&descriptor.url, archive_path)
            .await?;

        let computed = md5_hex(archive_path).await?;
        if !computed.eq_ignore_ascii_case(&descriptor.expected_hash) {
            return Err(CollectorError::Integrity {
                archive: descriptor.file_name.clone(),
                expected: descriptor.expected_hash.clone(),
                actual: computed,
            });
        }

        let members = extract_zip(archive_path, scratch_dir).await?;
        debug!(
            archive = descriptor.file_name,
            members = members.len(),
            "Archive verified and extracted"
        );

        let produced_urls = self.upload_members(descriptor, &members).await?;

        // Announce before committing the hash: a crash in between causes a
        // reprocess next tick, never a committed archive nobody heard about.
        self.event_bus.emit(ExtractedEvent {
            descriptor: descriptor.clone(),
            produced_urls: produced_urls.clone(),
        })?;

        self.hash_store
            .put(&descriptor.file_name, &descriptor.expected_hash)
            .await?;

        if let Err(err) = tokio::fs::remove_file(archive_path).await {
            warn!(archive = descriptor.file_name, %err, "Failed to remove downloaded archive");
        }

        Ok(produced_urls)
    }

    /// Uploads every extracted member under its basename, in order. A member
    /// upload failure rolls back all objects uploaded so far (best effort)
    /// and fails the archive.
    async fn upload_members(
        &self,
        descriptor: &ArchiveDescriptor,
        members: &[PathBuf],
    ) -> Result<Vec<String>, CollectorError> {
        let mut uploaded: Vec<(String, String)> = Vec::new();

        for member in members {
            let object_name = member
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| CollectorError::Extraction {
                    archive: descriptor.file_name.clone(),
                    reason: format!("member has no usable file name: {}", member.display()),
                })?;

            match self.object_store.upload(object_name, member).await {
                Ok(url) => {
                    debug!(object = object_name, url, "Uploaded archive member");
                    uploaded.push((object_name.to_string(), url));
                    if let Err(err) = tokio::fs::remove_file(member).await {
                        warn!(member = %member.display(), %err, "Failed to remove extracted member");
                    }
                }
                Err(err) => {
                    warn!(
                        archive = descriptor.file_name,
                        object = object_name,
                        %err,
                        "Upload failed, rolling back {} uploaded objects",
                        uploaded.len()
                    );
                    for (object, _) in &uploaded {
                        if let Err(delete_err) = self.object_store.delete(object).await {
                            warn!(object, %delete_err, "Rollback delete failed");
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(uploaded.into_iter().map(|(_, url)| url).collect())
    }
}

fn monotonic_timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
