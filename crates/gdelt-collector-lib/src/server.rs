use crate::pipeline::Coordinator;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/gdelt/process", post(trigger_process))
        .with_state(state)
}

/// Manual trigger. Always answers 202; the tick runs in the background and
/// failures are observable only in logs.
async fn trigger_process(State(state): State<AppState>) -> StatusCode {
    info!("Manifest check requested over HTTP");
    tokio::spawn(async move {
        if let Err(err) = state.coordinator.tick().await {
            warn!(%err, "Triggered manifest check failed");
        }
    });
    StatusCode::ACCEPTED
}
