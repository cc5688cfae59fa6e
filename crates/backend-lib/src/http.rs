// ============================
// crates/backend-lib/src/http.rs
// ============================
//! Plain HTTP endpoints next to the WebSocket: liveness, a small health
//! report and a read-only room summary for dashboards.

use crate::error::AppError;
use crate::store::SessionStore;
use crate::validation;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub uptime_secs: u64,
    pub active_connections: usize,
    /// Resident set size in KiB, absent outside Linux.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss_kib: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub participants: HashMap<String, String>,
    pub participant_count: usize,
    pub message_count: u64,
}

/// `GET /health` — process liveness only, no dependencies touched.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /metrics` — store reachability plus cheap process stats.
pub async fn metrics_report<S: SessionStore>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<MetricsResponse> {
    let store = match state.store.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    Json(MetricsResponse {
        status: if store == "up" { "ok" } else { "degraded" },
        store,
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_connections: state.registry.connection_count(),
        rss_kib: resident_set_kib(),
    })
}

/// `GET /rooms/{room_id}` — the stored view of a room, which is the
/// cross-process truth rather than this process's live connections.
pub async fn room_summary<S: SessionStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSummary>, AppError> {
    let room_id = validation::validate_room_id(&room_id)
        .map_err(|err| AppError::InvalidInput(err.to_string()))?;

    let participants = state.store.participants(room_id).await?;
    let message_count = state.store.message_count(room_id).await?;
    Ok(Json(RoomSummary {
        room_id: room_id.to_string(),
        participant_count: participants.len(),
        participants,
        message_count,
    }))
}

/// VmRSS from `/proc/self/status`, in KiB.
fn resident_set_kib() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    line.split_whitespace().nth(1)?.parse().ok()
}
