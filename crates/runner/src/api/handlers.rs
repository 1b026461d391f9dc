use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use modis_runner_core::RegistrySnapshot;

use crate::metrics::encode_metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub station: String,
    pub version: String,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        station: state.station().to_string(),
        version: state.version().to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Readiness and job registries.
pub async fn scenes(State(state): State<Arc<AppState>>) -> Json<RegistrySnapshot> {
    Json(state.snapshot().await)
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot().await;
    crate::metrics::collect_dynamic_metrics(&snapshot);

    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
