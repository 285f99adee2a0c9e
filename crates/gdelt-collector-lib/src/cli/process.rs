use crate::config::load_config;
use crate::error::CollectorError;
use crate::service::Collector;
use tracing;

/// Single manifest check, mainly for operational poking and smoke tests.
pub async fn run_process(config_path: &str) -> Result<(), CollectorError> {
    tracing::info!("Loading configuration from {}", config_path);
    let config = load_config(config_path)?;

    let collector = Collector::build(&config).await?;
    let summary = collector.coordinator.tick().await?;

    tracing::info!(
        parsed = summary.parsed,
        selected = summary.selected,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Manifest check completed"
    );

    // Let in-flight publishes drain before tearing the listener down.
    tokio::task::yield_now().await;
    collector.shutdown_listener();
    Ok(())
}
