//! HTTP endpoint serving `/health` and `/metrics`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use tokio::sync::watch;
use tracing::{error, info};

use super::health::{HealthState, Status};
use super::metrics::Metrics;
use crate::error::{Error, Result};

#[derive(Clone)]
struct ServerState {
    health: Arc<HealthState>,
    metrics: Arc<Metrics>,
}

/// Serve until the shutdown signal flips.
pub async fn serve(
    bind_addr: &str,
    health: Arc<HealthState>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(ServerState { health, metrics });

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = bind_addr, "Observability endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(Error::Io)?;

    Ok(())
}

async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let snapshot = state.health.snapshot();
    let code = match snapshot.status {
        Status::Healthy | Status::Degraded => StatusCode::OK,
        Status::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(snapshot))
}

async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let families = state.metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
        error!(error = %e, "Metrics encoding failed");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (
        StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}
