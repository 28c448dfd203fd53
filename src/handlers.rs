//! HTTP surface: `/metrics` for Prometheus and `/health` for humans and probes.

use std::io;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use crate::state::SharedState;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Builds the router over the shared exporter state.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serves `router(state)` on `listener` until `shutdown` flips to `true`.
pub async fn serve(
    listener: TcpListener,
    state: SharedState,
    mut shutdown: watch::Receiver<bool>,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "metrics server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

pub(crate) async fn handle_metrics(State(state): State<SharedState>) -> Response {
    match state.sink().encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
    ticks: u64,
    last_success: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

pub(crate) async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let health = state.health();
    Json(HealthResponse {
        status: health.status(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        ticks: health.ticks,
        last_success: health.last_success,
        last_error: health.last_error,
    })
}
