//! Relay handlers for per-channel control and device recovery

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::api_ok;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use relay_core::api::{ApiResponse, RelayCommandResponse, RelayStatusResponse, SwitchQuery};
use relay_core::protocol::{hex_string, Opcode};
use relay_core::{ConnectionStatus, RelayError};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Narrow the path parameter to a wire channel byte
fn channel_arg(channel: u16, max: u8) -> Result<u8, ApiError> {
    u8::try_from(channel).map_err(|_| ApiError::from(RelayError::InvalidChannel { channel, max }))
}

async fn command(
    state: &AppState,
    channel: u16,
    opcode: Opcode,
    name: &str,
    feedback: bool,
) -> Result<Json<ApiResponse<RelayCommandResponse>>, ApiError> {
    let channel = channel_arg(channel, state.controller.max_channel())?;

    state.controller.send_command(channel, opcode).await?;
    debug!("Channel {} {} sent", channel, name);

    api_ok!(RelayCommandResponse {
        channel,
        command: name.to_string(),
        feedback,
    })
}

/// Switch a channel on.
///
/// # Endpoint
///
/// `GET /api/v0/relay/:channel/on?feedback=true`
///
/// # Query Parameters
///
/// - `feedback` - Use the feedback opcode (the confirmation is not awaited)
pub(crate) async fn switch_on(
    State(state): State<AppState>,
    Path(channel): Path<u16>,
    Query(query): Query<SwitchQuery>,
) -> Result<Json<ApiResponse<RelayCommandResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relay/{}/on", channel);

    command(
        &state,
        channel,
        Opcode::switch(true, query.feedback),
        "on",
        query.feedback,
    )
    .await
}

/// Switch a channel off.
///
/// # Endpoint
///
/// `GET /api/v0/relay/:channel/off?feedback=true`
pub(crate) async fn switch_off(
    State(state): State<AppState>,
    Path(channel): Path<u16>,
    Query(query): Query<SwitchQuery>,
) -> Result<Json<ApiResponse<RelayCommandResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relay/{}/off", channel);

    command(
        &state,
        channel,
        Opcode::switch(false, query.feedback),
        "off",
        query.feedback,
    )
    .await
}

/// Toggle a channel.
///
/// # Endpoint
///
/// `GET /api/v0/relay/:channel/toggle`
pub(crate) async fn toggle(
    State(state): State<AppState>,
    Path(channel): Path<u16>,
) -> Result<Json<ApiResponse<RelayCommandResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relay/{}/toggle", channel);

    command(&state, channel, Opcode::Toggle, "toggle", false).await
}

/// Query a channel.
///
/// # Endpoint
///
/// `GET /api/v0/relay/:channel/status`
///
/// # Returns
///
/// The raw reply bytes and their hex rendering. The reply is not decoded; a
/// board that stays silent yields an empty `raw`.
pub(crate) async fn status(
    State(state): State<AppState>,
    Path(channel): Path<u16>,
) -> Result<Json<ApiResponse<RelayStatusResponse>>, ApiError> {
    debug!("Request: GET /api/v0/relay/{}/status", channel);

    let channel = channel_arg(channel, state.controller.max_channel())?;

    let raw = match state.controller.try_query_status(channel).await {
        Ok(raw) => raw,
        Err(RelayError::ProtocolTimeout(msg)) => {
            debug!("No status reply: {}", msg);
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let hex = hex_string(&raw);
    api_ok!(RelayStatusResponse { channel, raw, hex })
}

/// Drop the current connection and run discovery again.
///
/// # Endpoint
///
/// `POST /api/v0/device/reconnect`
///
/// # Behavior
///
/// Holds the request until discovery finishes, which takes up to the full
/// retry window when no board is present. Answers 503 when no board could
/// be opened.
pub(crate) async fn reconnect(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: POST /api/v0/device/reconnect");

    let device_path = state.controller.force_reconnect().await?;
    info!("Reconnected via API to {}", device_path);

    api_ok!(json!({
        "connection_status": ConnectionStatus::Connected,
        "device_path": device_path.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{body_json, create_test_app};
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use relay_hardware::MockBackend;
    use tower::ServiceExt;

    async fn call(app: axum::Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_on_sends_frame() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, json) = call(app, Method::GET, "/api/v0/relay/1/on").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"]["channel"], 1);
        assert_eq!(json["data"]["command"], "on");
        assert_eq!(json["data"]["feedback"], false);
        assert_eq!(backend.sent_frames()[0].as_bytes(), &[0xA0, 0x01, 0x01, 0xA2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_off_with_feedback() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, json) = call(app, Method::GET, "/api/v0/relay/3/off?feedback=true").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["feedback"], true);
        assert_eq!(backend.sent_frames()[0].as_bytes(), &[0xA0, 0x03, 0x02, 0xA5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, _) = call(app, Method::GET, "/api/v0/relay/2/toggle").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(backend.sent_frames()[0].opcode(), 0x04);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_channels_are_bad_requests() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        for uri in ["/api/v0/relay/0/on", "/api/v0/relay/256/on", "/api/v0/relay/300/status"] {
            let (status, json) = call(app.clone(), Method::GET, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json["status"], "error");
        }
        assert!(backend.sent_frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_returns_raw_reply() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, json) = call(app, Method::GET, "/api/v0/relay/1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["raw"], serde_json::json!([0xA0, 0x01, 0x05, 0xA6]));
        assert_eq!(json["data"]["hex"], "A0 01 05 A6");
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_board_gives_empty_status() {
        let backend = MockBackend::new();
        backend.attach("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, json) = call(app, Method::GET, "/api/v0/relay/1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["raw"], serde_json::json!([]));
        assert_eq!(json["data"]["hex"], "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplugged_board_is_unavailable() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;
        backend.detach("/dev/ttyUSB0");

        let (status, json) = call(app, Method::GET, "/api/v0/relay/1/on").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["status"], "error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_moves_to_new_node() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, controller) = create_test_app(&backend).await;
        backend.detach("/dev/ttyUSB0");
        backend.attach("/dev/ttyUSB1");

        let (status, json) = call(app.clone(), Method::POST, "/api/v0/device/reconnect").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["connection_status"], "connected");
        assert_eq!(json["data"]["device_path"], "/dev/ttyUSB1");
        assert_eq!(controller.reconnect_count(), 1);

        backend.detach("/dev/ttyUSB1");
        let (status, json) = call(app, Method::POST, "/api/v0/device/reconnect").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "Relay board not available");
    }
}
