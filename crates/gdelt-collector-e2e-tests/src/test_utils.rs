use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as AxumPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use gdelt_collector_lib::config::HttpConfig;
use gdelt_collector_lib::error::CollectorError;
use gdelt_collector_lib::events::{EventBus, spawn_listener};
use gdelt_collector_lib::fileops::{Downloader, Md5Digest};
use gdelt_collector_lib::pipeline::{ArchiveProcessor, Coordinator};
use gdelt_collector_lib::publish::{Publisher, RetryScheduler};
use gdelt_collector_lib::storage::{ObjectStore, object_url};
use gdelt_collector_lib::store::{FileSendRecord, HashStore, StatusStore};
use gdelt_collector_lib::topic::TopicResolver;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const EVENT_TOPIC: &str = "gdelt.events";
pub const MENTION_TOPIC: &str = "gdelt.mentions";
pub const OBJECT_ENDPOINT: &str = "http://objects.local";
pub const OBJECT_BUCKET: &str = "gdelt";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Polls `condition` until it holds or the timeout elapses.
pub async fn wait_until(condition: impl Fn() -> bool, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed().as_secs() < timeout_secs {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, options).expect("add directory");
            } else {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(data).expect("write entry");
            }
        }
        writer.finish().expect("finish zip");
    }
    cursor.into_inner()
}

pub fn md5_hex_of(data: &[u8]) -> String {
    let mut digest = Md5Digest::new();
    digest.update(data);
    digest.finalize_hex()
}

#[derive(Default)]
pub struct MemoryHashStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryHashStore {
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

#[async_trait]
impl HashStore for MemoryHashStore {
    async fn stored(&self, archive_name: &str) -> Result<Option<String>, CollectorError> {
        Ok(self.entries.lock().unwrap().get(archive_name).cloned())
    }

    async fn put(&self, archive_name: &str, hash: &str) -> Result<(), CollectorError> {
        self.entries
            .lock()
            .unwrap()
            .insert(archive_name.to_string(), hash.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStatusStore {
    records: Mutex<HashMap<String, FileSendRecord>>,
}

impl MemoryStatusStore {
    pub fn snapshot(&self) -> Vec<FileSendRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    pub fn sent(&self, file_url: &str) -> Option<bool> {
        self.records
            .lock()
            .unwrap()
            .get(file_url)
            .map(|record| record.sent)
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn register(
        &self,
        archive_file_name: &str,
        file_url: &str,
    ) -> Result<bool, CollectorError> {
        self.records.lock().unwrap().insert(
            file_url.to_string(),
            FileSendRecord {
                archive_file_name: archive_file_name.to_string(),
                file_url: file_url.to_string(),
                sent: false,
            },
        );
        Ok(true)
    }

    async fn mark_sent(&self, file_url: &str) -> Result<bool, CollectorError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(file_url) {
            Some(record) => {
                record.sent = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, file_url: &str) -> Result<Option<FileSendRecord>, CollectorError> {
        Ok(self.records.lock().unwrap().get(file_url).cloned())
    }

    async fn pending(&self) -> Result<Vec<FileSendRecord>, CollectorError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|record| !record.sent)
            .cloned()
            .collect())
    }
}

/// In-memory object store mimicking the S3 layout and URL scheme. Can be told
/// to fail the upload of one object name to exercise rollback paths.
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_object: Mutex<Option<String>>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_object: Mutex::new(None),
        }
    }
}

impl MemoryObjectStore {
    pub fn object(&self, object_name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(object_name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn fail_upload_of(&self, object_name: &str) {
        *self.fail_object.lock().unwrap() = Some(object_name.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        object_name: &str,
        local_path: &Path,
    ) -> Result<String, CollectorError> {
        if self.fail_object.lock().unwrap().as_deref() == Some(object_name) {
            return Err(CollectorError::Storage {
                object: object_name.to_string(),
                reason: "injected upload failure".to_string(),
            });
        }
        let data = tokio::fs::read(local_path).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(object_name.to_string(), data);
        self.uploads.lock().unwrap().push(object_name.to_string());
        Ok(self.url(object_name))
    }

    async fn delete(&self, object_name: &str) -> Result<(), CollectorError> {
        self.objects.lock().unwrap().remove(object_name);
        self.deletes.lock().unwrap().push(object_name.to_string());
        Ok(())
    }

    fn url(&self, object_name: &str) -> String {
        object_url(OBJECT_ENDPOINT, OBJECT_BUCKET, object_name)
    }
}

/// Publisher double with broker-ack semantics: a successful send marks the
/// status record sent, a configured failure leaves it untouched.
pub struct MemoryPublisher {
    status_store: Arc<MemoryStatusStore>,
    sends: Mutex<Vec<(String, String)>>,
    fail_urls: Mutex<HashSet<String>>,
}

impl MemoryPublisher {
    pub fn new(status_store: Arc<MemoryStatusStore>) -> Self {
        Self {
            status_store,
            sends: Mutex::new(Vec::new()),
            fail_urls: Mutex::new(HashSet::new()),
        }
    }

    pub fn sends(&self) -> Vec<(String, String)> {
        self.sends.lock().unwrap().clone()
    }

    pub fn fail_sends_to(&self, url: &str) {
        self.fail_urls.lock().unwrap().insert(url.to_string());
    }

    pub fn heal(&self) {
        self.fail_urls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn send(&self, topic: &str, url: &str) -> Result<(), CollectorError> {
        self.sends
            .lock()
            .unwrap()
            .push((topic.to_string(), url.to_string()));
        if self.fail_urls.lock().unwrap().contains(url) {
            return Err(CollectorError::Publish {
                topic: topic.to_string(),
                reason: "injected broker failure".to_string(),
            });
        }
        self.status_store.mark_sent(url).await?;
        Ok(())
    }
}

#[derive(Clone)]
struct FixtureState {
    manifest: Arc<Mutex<String>>,
    archives: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    archive_hits: Arc<Mutex<HashMap<String, usize>>>,
}

/// Local HTTP server standing in for the feed publisher: serves the manifest
/// and archive bodies, counting archive fetches.
pub struct FixtureServer {
    pub base_url: String,
    state: FixtureState,
}

impl FixtureServer {
    pub async fn start() -> Self {
        let state = FixtureState {
            manifest: Arc::new(Mutex::new(String::new())),
            archives: Arc::new(Mutex::new(HashMap::new())),
            archive_hits: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new()
            .route("/manifest.txt", get(serve_manifest))
            .route("/gdeltv2/:file", get(serve_archive))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fixture server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn manifest_url(&self) -> String {
        format!("{}/manifest.txt", self.base_url)
    }

    pub fn archive_url(&self, file_name: &str) -> String {
        format!("{}/gdeltv2/{}", self.base_url, file_name)
    }

    pub fn set_manifest(&self, body: &str) {
        *self.state.manifest.lock().unwrap() = body.to_string();
    }

    /// Registers an archive body and returns its manifest line.
    pub fn put_archive(&self, file_name: &str, body: Vec<u8>) -> String {
        let line = format!(
            "{} {} {}",
            body.len(),
            md5_hex_of(&body),
            self.archive_url(file_name)
        );
        self.state
            .archives
            .lock()
            .unwrap()
            .insert(file_name.to_string(), body);
        line
    }

    /// Total archive requests served, all files.
    pub fn archive_hits(&self) -> usize {
        self.state.archive_hits.lock().unwrap().values().sum()
    }

    pub fn hits_for(&self, file_name: &str) -> usize {
        self.state
            .archive_hits
            .lock()
            .unwrap()
            .get(file_name)
            .copied()
            .unwrap_or(0)
    }
}

async fn serve_manifest(State(state): State<FixtureState>) -> String {
    state.manifest.lock().unwrap().clone()
}

async fn serve_archive(
    State(state): State<FixtureState>,
    AxumPath(file): AxumPath<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    *state
        .archive_hits
        .lock()
        .unwrap()
        .entry(file.clone())
        .or_insert(0) += 1;

    let Some(body) = state.archives.lock().unwrap().get(&file).cloned() else {
        return (StatusCode::NOT_FOUND, Vec::new()).into_response();
    };

    // Honor simple byte ranges; the downloader's transport may read in
    // ranged chunks.
    if let Some(range) = headers
        .get(axum::http::header::RANGE)
        .and_then(|value| value.to_str().ok())
    {
        if let Some((start, end)) = parse_byte_range(range, body.len()) {
            let total = body.len();
            let slice = body[start..=end].to_vec();
            let mut response = (StatusCode::PARTIAL_CONTENT, slice).into_response();
            response.headers_mut().insert(
                axum::http::header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, total)
                    .parse()
                    .expect("valid content-range"),
            );
            return response;
        }
    }

    (StatusCode::OK, body).into_response()
}

fn parse_byte_range(value: &str, len: usize) -> Option<(usize, usize)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: usize = start.parse().ok()?;
    let end = if end.is_empty() {
        len.checked_sub(1)?
    } else {
        end.parse::<usize>().ok()?.min(len.checked_sub(1)?)
    };
    (start <= end).then_some((start, end))
}

/// A fully wired collector over in-memory collaborators and the fixture
/// server, one per test.
pub struct TestHarness {
    pub server: FixtureServer,
    pub download_dir: TempDir,
    pub hash_store: Arc<MemoryHashStore>,
    pub status_store: Arc<MemoryStatusStore>,
    pub object_store: Arc<MemoryObjectStore>,
    pub publisher: Arc<MemoryPublisher>,
    pub resolver: Arc<TopicResolver>,
    pub processor: Arc<ArchiveProcessor>,
    pub http_config: HttpConfig,
    pub coordinator: Coordinator,
    pub retry: RetryScheduler,
}

impl TestHarness {
    pub async fn start() -> Self {
        let server = FixtureServer::start().await;
        let download_dir = tempfile::tempdir().expect("download dir");

        let hash_store = Arc::new(MemoryHashStore::default());
        let status_store = Arc::new(MemoryStatusStore::default());
        let object_store = Arc::new(MemoryObjectStore::default());
        let publisher = Arc::new(MemoryPublisher::new(status_store.clone()));
        let resolver = Arc::new(TopicResolver::new(EVENT_TOPIC, MENTION_TOPIC));

        let http_config = HttpConfig {
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
            retry_period_ms: 10,
            retry_max_period_ms: 50,
            retry_max_attempts: 1,
        };

        let (event_bus, events) = EventBus::channel();
        let _listener = spawn_listener(
            events,
            resolver.clone(),
            status_store.clone(),
            publisher.clone(),
        );

        let processor = Arc::new(ArchiveProcessor::new(
            Downloader::new(http_config.clone()),
            hash_store.clone(),
            object_store.clone(),
            event_bus,
            download_dir.path().to_path_buf(),
        ));
        let coordinator = Coordinator::new(
            server.manifest_url(),
            &http_config,
            resolver.clone(),
            hash_store.clone(),
            processor.clone(),
        )
        .expect("coordinator");
        let retry = RetryScheduler::new(
            status_store.clone(),
            resolver.clone(),
            publisher.clone(),
        );

        Self {
            server,
            download_dir,
            hash_store,
            status_store,
            object_store,
            publisher,
            resolver,
            processor,
            http_config,
            coordinator,
            retry,
        }
    }

    /// A coordinator identical to the harness one apart from the manifest URL.
    pub fn coordinator_for(&self, manifest_url: String) -> Coordinator {
        Coordinator::new(
            manifest_url,
            &self.http_config,
            self.resolver.clone(),
            self.hash_store.clone(),
            self.processor.clone(),
        )
        .expect("coordinator")
    }

    /// Non-directory entries currently present in the download scratch area.
    pub fn download_dir_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.download_dir.path()).expect("read download dir") {
            let entry = entry.expect("dir entry");
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        files.sort();
        files
    }

    pub fn download_dir_subdirs(&self) -> Vec<String> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(self.download_dir.path()).expect("read download dir") {
            let entry = entry.expect("dir entry");
            if entry.path().is_dir() {
                dirs.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        dirs
    }
}
