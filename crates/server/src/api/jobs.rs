//! Job submission and lookup handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use pdfpipe_core::{GatewayError, JobRecord, SubmitRequest};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub status: String,
    pub job_id: String,
    /// Same value as `job_id`; the pipeline names its artifact after it.
    pub task_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn gateway_error(err: GatewayError) -> ApiError {
    let status = match &err {
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        GatewayError::Conflict(_) => StatusCode::CONFLICT,
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::QueueUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a document for extraction.
///
/// A body that is not valid JSON is treated like one without `pdf_url`. Valid
/// JSON of the wrong shape is rejected with its own message.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let request = match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => serde_json::from_value::<SubmitRequest>(value).map_err(|e| {
            debug!("Submission body has the wrong shape: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("Invalid request body: {}", e),
                }),
            )
        })?,
        Err(e) => {
            debug!("Unparseable submission body: {}", e);
            SubmitRequest::default()
        }
    };

    let job_id = state.gateway().submit(request).map_err(gateway_error)?;

    Ok(Json(SubmitResponse {
        status: "success".to_string(),
        task_id: job_id.clone(),
        job_id,
    }))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state.gateway().status(&id).map(Json).map_err(gateway_error)
}

/// Cancel a job that no worker has taken yet
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state.gateway().cancel(&id).map(Json).map_err(gateway_error)
}
