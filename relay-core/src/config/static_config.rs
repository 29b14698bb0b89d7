//! Static configuration loaded once at startup
//!
//! This configuration is read-only after the daemon starts. Every section
//! falls back to its defaults, so a partial file is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::board::{BoardConfig, DefaultBoard};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub hostname: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 5153,
        }
    }
}

/// Serial device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Fixed device node; when unset the node is discovered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Line speed
    pub baud_rate: u32,
    /// Open/probe and I/O timeout in milliseconds
    pub timeout_ms: u64,
    /// Highest channel the daemon will address
    ///
    /// 255 keeps every channel byte usable; the checksum wraps for channels
    /// above 0x5F.
    pub max_channel: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: None,
            baud_rate: DefaultBoard::BAUD_RATE,
            timeout_ms: DefaultBoard::DEFAULT_TIMEOUT_MS,
            max_channel: u8::MAX,
        }
    }
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Discovery retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Number of scans before giving up
    pub attempts: u32,
    /// Pause between scans, in seconds
    pub interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_secs: 3,
        }
    }
}

/// Device-event monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotplugConfig {
    /// Watch for attach/detach events at all
    pub enabled: bool,
    /// Delay after an add event before rescanning, in milliseconds
    pub settle_delay_ms: u64,
    /// Fall back to polling when the udev subscription fails
    ///
    /// When false, a failed subscription aborts startup.
    pub fallback_to_polling: bool,
    /// Polling interval in seconds
    pub poll_interval_secs: u64,
}

impl Default for HotplugConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            settle_delay_ms: 1000,
            fallback_to_polling: true,
            poll_interval_secs: 2,
        }
    }
}

impl HotplugConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Gate pulse endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Channel pulsed by `/gate-open`
    pub open_channel: u8,
    /// Channel pulsed by `/gate-close`
    pub close_channel: u8,
    /// How long the channel stays on, in milliseconds
    pub pulse_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            open_channel: 1,
            close_channel: 2,
            pulse_ms: 200,
        }
    }
}

impl GateConfig {
    pub fn pulse(&self) -> Duration {
        Duration::from_millis(self.pulse_ms)
    }
}

/// Shutdown behavior
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Channels switched off before the daemon exits
    pub switch_off_channels: Vec<u8>,
}

/// Static configuration for the relay daemon.
///
/// Located at `~/.config/relaygate/config.toml` by default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub server: ServerConfig,
    pub device: DeviceConfig,
    pub discovery: DiscoveryConfig,
    pub hotplug: HotplugConfig,
    pub gate: GateConfig,
    pub shutdown: ShutdownConfig,
}

impl StaticConfig {
    /// Parse StaticConfig from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize StaticConfig to TOML string.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check values that would make the daemon misbehave
    pub fn validate(&self) -> crate::Result<()> {
        if self.discovery.attempts == 0 {
            return Err(crate::RelayError::Config(
                "discovery.attempts must be at least 1".to_string(),
            ));
        }
        if self.device.max_channel == 0 {
            return Err(crate::RelayError::Config(
                "device.max_channel must be at least 1".to_string(),
            ));
        }
        for (name, channel) in [
            ("gate.open_channel", self.gate.open_channel),
            ("gate.close_channel", self.gate.close_channel),
        ] {
            if channel == 0 || channel > self.device.max_channel {
                return Err(crate::RelayError::Config(format!(
                    "{} must be 1-{}, got {}",
                    name, self.device.max_channel, channel
                )));
            }
        }
        Ok(())
    }
}
