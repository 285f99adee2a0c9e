use crate::config::load_config;
use crate::error::CollectorError;
use crate::service;
use tracing;

pub async fn run_service(config_path: &str) -> Result<(), CollectorError> {
    tracing::info!("Loading configuration from {}", config_path);
    let config = load_config(config_path)?;

    service::run(config).await
}
