use crate::config::Config;
use crate::error::CollectorError;
use crate::events::{EventBus, spawn_listener};
use crate::fileops::{Downloader, ensure_dir};
use crate::pipeline::{ArchiveProcessor, Coordinator};
use crate::publish::{KafkaPublisher, Publisher, RetryScheduler};
use crate::server::{AppState, router};
use crate::storage::{ObjectStore, S3ObjectStore};
use crate::store::{HashStore, RedisHashStore, RedisStatusStore, StatusStore};
use crate::topic::TopicResolver;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fully wired collector: every collaborator constructed once at startup and
/// injected, no global state.
pub struct Collector {
    pub coordinator: Arc<Coordinator>,
    pub retry: Arc<RetryScheduler>,
    listener: JoinHandle<()>,
}

impl Collector {
    /// Builds all collaborators. Fails fast if the object store bucket cannot
    /// be confirmed: the service must not accept work in that state.
    pub async fn build(config: &Config) -> Result<Self, CollectorError> {
        ensure_dir(&config.download_dir)?;

        let redis_client = redis::Client::open(config.kv.url.as_str())?;
        let conn = ConnectionManager::new(redis_client).await?;
        let hash_store: Arc<dyn HashStore> =
            Arc::new(RedisHashStore::new(conn.clone(), config.hash_ttl()));
        let status_store: Arc<dyn StatusStore> =
            Arc::new(RedisStatusStore::new(conn, config.status_ttl()));

        let object_store: Arc<dyn ObjectStore> =
            Arc::new(S3ObjectStore::connect(&config.object_store).await?);

        let resolver = Arc::new(TopicResolver::new(
            &config.bus.event_topic,
            &config.bus.mention_topic,
        ));
        let publisher: Arc<dyn Publisher> = Arc::new(KafkaPublisher::new(
            &config.bus.bootstrap_servers,
            status_store.clone(),
        )?);

        let (event_bus, events) = EventBus::channel();
        let listener = spawn_listener(
            events,
            resolver.clone(),
            status_store.clone(),
            publisher.clone(),
        );

        let processor = Arc::new(ArchiveProcessor::new(
            Downloader::new(config.http.clone()),
            hash_store.clone(),
            object_store,
            event_bus,
            config.download_dir.clone(),
        ));
        let coordinator = Arc::new(Coordinator::new(
            config.manifest_url.clone(),
            &config.http,
            resolver.clone(),
            hash_store,
            processor,
        )?);
        let retry = Arc::new(RetryScheduler::new(status_store, resolver, publisher));

        Ok(Self {
            coordinator,
            retry,
            listener,
        })
    }

    pub fn shutdown_listener(self) {
        self.listener.abort();
    }
}

/// Runs the collector until ctrl-c: periodic manifest checks, periodic
/// delivery retries, and the HTTP trigger endpoint.
pub async fn run(config: Config) -> Result<(), CollectorError> {
    let collector = Collector::build(&config).await?;
    let cancel = CancellationToken::new();

    let check_loop = spawn_check_loop(
        collector.coordinator.clone(),
        config.check_interval(),
        cancel.clone(),
    );
    let retry_loop = spawn_retry_loop(
        collector.retry.clone(),
        config.retry_interval(),
        cancel.clone(),
    );

    let listener = tokio::net::TcpListener::bind(config.server.bind.as_str()).await?;
    info!(bind = config.server.bind, "Collector started");

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        shutdown.cancel();
    });

    let app = router(AppState {
        coordinator: collector.coordinator.clone(),
    });
    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    cancel.cancel();
    if let Err(err) = check_loop.await {
        warn!(%err, "Manifest check loop ended abnormally");
    }
    if let Err(err) = retry_loop.await {
        warn!(%err, "Retry loop ended abnormally");
    }
    collector.shutdown_listener();
    info!("Collector stopped");
    Ok(())
}

fn spawn_check_loop(
    coordinator: Arc<Coordinator>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = coordinator.tick().await {
                        warn!(%err, "Manifest check failed");
                    }
                }
            }
        }
    })
}

fn spawn_retry_loop(
    retry: Arc<RetryScheduler>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => retry.sweep().await,
            }
        }
    })
}
