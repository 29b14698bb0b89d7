//! Gate handlers
//!
//! A gate is driven by pulsing a relay channel: switch it on, hold for the
//! configured pulse, switch it off. Opening and closing use separate channels.

use crate::api::AppState;
use axum::{extract::State, Json};
use relay_core::api::GateResponse;
use relay_hardware::RelayController;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Pulse `channel` and report the outcome
///
/// Only the switch-on decides success; a failed switch-off is logged.
async fn pulse(controller: &RelayController, channel: u8, hold: Duration, action: &str) -> GateResponse {
    if !controller.open_channel(channel, false).await {
        warn!("Gate {}: switching channel {} on failed", action, channel);
        return GateResponse::failed(format!("Failed to {} gate", action));
    }

    sleep(hold).await;

    if !controller.close_channel(channel, false).await {
        warn!("Gate {}: switching channel {} off failed", action, channel);
    }

    info!("Gate {} pulse on channel {}", action, channel);
    GateResponse::ok(format!("Gate {} succeeded", action))
}

/// Open the gate.
///
/// # Endpoint
///
/// `GET /gate-open`
///
/// Always answers HTTP 200; `code` is 200 on success, 202 on failure.
pub(crate) async fn gate_open(State(state): State<AppState>) -> Json<GateResponse> {
    debug!("Request: GET /gate-open");

    Json(pulse(&state.controller, state.gate.open_channel, state.gate.pulse(), "open").await)
}

/// Close the gate.
///
/// # Endpoint
///
/// `GET /gate-close`
///
/// Always answers HTTP 200; `code` is 200 on success, 202 on failure.
pub(crate) async fn gate_close(State(state): State<AppState>) -> Json<GateResponse> {
    debug!("Request: GET /gate-close");

    Json(pulse(&state.controller, state.gate.close_channel, state.gate.pulse(), "close").await)
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{body_json, create_test_app};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use relay_hardware::MockBackend;
    use tower::ServiceExt;

    async fn call(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, body_json(response.into_body()).await)
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_open_pulses_channel_one() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (status, json) = call(app, "/gate-open").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], 200);

        let frames: Vec<[u8; 4]> = backend
            .sent_frames()
            .iter()
            .map(|f| *f.as_bytes())
            .collect();
        assert_eq!(
            frames,
            vec![[0xA0, 0x01, 0x01, 0xA2], [0xA0, 0x01, 0x00, 0xA1]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_close_pulses_channel_two() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, _) = create_test_app(&backend).await;

        let (_, json) = call(app, "/gate-close").await;
        assert_eq!(json["code"], 200);

        let channels: Vec<u8> = backend.sent_frames().iter().map(|f| f.channel()).collect();
        assert_eq!(channels, vec![2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_without_board_reports_202() {
        let backend = MockBackend::simulated_board("/dev/ttyUSB0");
        let (app, controller) = create_test_app(&backend).await;
        backend.detach("/dev/ttyUSB0");
        controller.handle_device_removed().await;

        let (status, json) = call(app, "/gate-open").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], 202);
        assert!(backend.sent_frames().is_empty());
    }
}
