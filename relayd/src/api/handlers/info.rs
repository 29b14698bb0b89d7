//! Info handlers for system information and root endpoint

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use relay_core::api::{ApiResponse, InfoResponse, VersionResponse};
use serde_json::{json, Value};
use tracing::debug;

/// Handle the root endpoint.
///
/// Provide basic service identification and status. Useful for health checks
/// and verifying the API is accessible.
///
/// # Endpoint
///
/// `GET /`
pub(crate) async fn root() -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /");

    let data = json!({
        "service": "Relay Gate API Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    });

    Ok(Json(ApiResponse::success(data)))
}

/// Report the daemon version.
///
/// # Endpoint
///
/// `GET /version`
///
/// Answers a bare `{"version": "..."}` object, without the API envelope.
pub(crate) async fn version() -> Json<VersionResponse> {
    debug!("Request: GET /version");

    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Retrieve device and connection information.
///
/// # Endpoint
///
/// `GET /api/v0/info`
///
/// # Returns
///
/// - `version` - Server version
/// - `board_info` - Board constants and channel limit
/// - `connection_status` - `uninitialized`, `searching`, `connected` or `disconnected`
/// - `device_path` - Device node in use (only when connected)
/// - `reconnect_count` - Reconnections since startup
/// - `time_since_disconnect_secs` - Seconds since the board was last lost
/// - `uptime` - Server uptime in seconds
///
/// Reads the published controller snapshot, so it answers even while a
/// discovery is holding the controller lock.
pub(crate) async fn get_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InfoResponse>>, ApiError> {
    debug!("Request: GET /api/v0/info");

    let controller = &state.controller;

    let info_response = InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        board_info: (*state.board_info).clone(),
        connection_status: controller.status(),
        device_path: controller.device_path().map(|p| p.to_string()),
        reconnect_count: controller.reconnect_count(),
        time_since_disconnect_secs: controller.time_since_disconnect().map(|d| d.as_secs()),
        uptime: state.start_time.elapsed().as_secs(),
    };

    Ok(Json(ApiResponse::success(info_response)))
}
