//! Route handlers.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State};
use configflow_core::UpdateRequest;
use configflow_telemetry::AGENT_VERSION;
use serde::Serialize;
use tracing::{info, warn};

use crate::http::constants::MESSAGE_UPDATE_STARTED;
use crate::http::errors::{ApiError, Envelope};
use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) version: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: AGENT_VERSION,
    })
}

/// Parse the payload and hand it to the updater; the transaction runs detached.
pub(crate) async fn config_update(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<Envelope>, ApiError> {
    let request: UpdateRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(error = %err, "failed to decode update request");
        ApiError::invalid_body()
    })?;
    info!(
        config_bytes = request.config.len(),
        directories = request.directories.len(),
        provider_downloads = request.provider_downloads.len(),
        ruleset_downloads = request.ruleset_downloads.len(),
        custom_files = request.custom_files.len(),
        "config update accepted"
    );
    state.updater.submit(request);
    Ok(Json(Envelope::ok(MESSAGE_UPDATE_STARTED)))
}
