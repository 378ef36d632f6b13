//! Queue and worker status handlers.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;
use pdfpipe_core::{QueueStatus, WorkerStatus};

use super::jobs::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    /// Jobs waiting for a worker.
    pub pending: usize,
    #[serde(flatten)]
    pub entries: QueueStatus,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkersStatusResponse {
    pub enabled: bool,
    #[serde(flatten)]
    pub status: WorkerStatus,
}

pub async fn queue_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<QueueStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let entries = state.queue().status().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    Ok(Json(QueueStatusResponse {
        pending: entries.ready,
        total: entries.total(),
        entries,
    }))
}

pub async fn workers_status(State(state): State<Arc<AppState>>) -> Json<WorkersStatusResponse> {
    let response = match state.pool() {
        Some(pool) => WorkersStatusResponse {
            enabled: true,
            status: pool.status(),
        },
        None => WorkersStatusResponse {
            enabled: false,
            status: WorkerStatus::default(),
        },
    };
    Json(response)
}
