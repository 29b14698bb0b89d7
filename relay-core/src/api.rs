//! API models for the relay daemon
//!
//! Request and response models shared by the HTTP layer and its clients.

use crate::board::BoardInfo;
use crate::types::ConnectionStatus;
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ApiResponse<T> {
    #[serde(rename = "success")]
    Success { data: T },
    #[serde(rename = "error")]
    Error { error: String },
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self::Success { data }
    }

    /// Create an error response
    pub fn error(error: String) -> Self {
        Self::Error { error }
    }
}

/// Status code reported by the gate endpoints on success
pub const GATE_OK: u16 = 200;

/// Status code reported by the gate endpoints on failure
pub const GATE_FAILED: u16 = 202;

/// Response body of the legacy `/gate-open` and `/gate-close` endpoints
///
/// These endpoints always answer HTTP 200; success or failure travels in
/// `code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResponse {
    pub code: u16,
    pub msg: String,
}

impl GateResponse {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            code: GATE_OK,
            msg: msg.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            code: GATE_FAILED,
            msg: msg.into(),
        }
    }
}

/// Response body of `/version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Server information response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Server version
    pub version: String,
    /// Board the daemon drives
    pub board_info: BoardInfo,
    /// Connection state of the relay device
    pub connection_status: ConnectionStatus,
    /// Device node in use, if connected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_path: Option<String>,
    /// Number of successful reconnections since server start
    #[serde(default)]
    pub reconnect_count: u32,
    /// Seconds since the device was last lost (None if never)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_since_disconnect_secs: Option<u64>,
    /// Server uptime in seconds
    pub uptime: u64,
}

/// Query parameters for on/off commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchQuery {
    /// Request a hardware confirmation (not awaited)
    #[serde(default)]
    pub feedback: bool,
}

/// Result of a switching command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayCommandResponse {
    /// Channel addressed
    pub channel: u8,
    /// Command that was sent ("on", "off", "toggle")
    pub command: String,
    /// Whether feedback was requested
    #[serde(default)]
    pub feedback: bool,
}

/// Result of a status query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayStatusResponse {
    /// Channel addressed
    pub channel: u8,
    /// Raw bytes returned by the board (may be empty)
    pub raw: Vec<u8>,
    /// The same bytes as space-separated hex
    pub hex: String,
}
