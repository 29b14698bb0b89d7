//! Driver settings derived from the daemon configuration

use relay_core::{BoardConfig, DefaultBoard, StaticConfig};
use std::time::Duration;

/// Pause enforced after every successful write
pub const QUIESCENCE_DELAY: Duration = Duration::from_millis(50);

/// How long a status query waits before collecting the reply
pub const QUERY_RESPONSE_WAIT: Duration = Duration::from_millis(200);

/// Bounded retry for discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of scans
    pub attempts: u32,
    /// Pause between consecutive scans
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval: Duration::from_secs(3),
        }
    }
}

/// Everything the scanner, connection, and controller need to know
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Fixed device node; disables pattern scanning
    pub device_path: Option<String>,
    /// Node name prefixes, searched in order
    pub name_prefixes: Vec<String>,
    pub baud_rate: u32,
    /// Open/probe and I/O timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Highest addressable channel
    pub max_channel: u8,
    pub quiescence: Duration,
    pub query_wait: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            device_path: None,
            name_prefixes: DefaultBoard::DEVICE_NAME_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            baud_rate: DefaultBoard::BAUD_RATE,
            timeout: Duration::from_millis(DefaultBoard::DEFAULT_TIMEOUT_MS),
            retry: RetryPolicy::default(),
            max_channel: u8::MAX,
            quiescence: QUIESCENCE_DELAY,
            query_wait: QUERY_RESPONSE_WAIT,
        }
    }
}

impl DriverSettings {
    pub fn from_config(config: &StaticConfig) -> Self {
        Self {
            device_path: config.device.path.clone(),
            baud_rate: config.device.baud_rate,
            timeout: config.device.timeout(),
            retry: RetryPolicy {
                attempts: config.discovery.attempts,
                interval: Duration::from_secs(config.discovery.interval_secs),
            },
            max_channel: config.device.max_channel,
            ..Self::default()
        }
    }
}
