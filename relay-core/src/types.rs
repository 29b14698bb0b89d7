//! Core types and data structures for the relay driver

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{RelayError, Result};

/// One physical relay output, numbered from 1
///
/// The wire format carries the channel in a single byte, so anything above
/// 255 cannot be addressed at all. Zero is not a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Create a channel, rejecting zero
    pub fn new(channel: u8) -> Result<Self> {
        if channel == 0 {
            return Err(RelayError::InvalidChannel {
                channel: 0,
                max: u8::MAX,
            });
        }
        Ok(Self(channel))
    }

    /// Raw channel byte as it appears in a command frame
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u16> for Channel {
    type Error = RelayError;

    fn try_from(value: u16) -> Result<Self> {
        let byte = u8::try_from(value).map_err(|_| RelayError::InvalidChannel {
            channel: value,
            max: u8::MAX,
        })?;
        Channel::new(byte)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> u8 {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// OS device node of the serial bridge, e.g. `/dev/ttyUSB0`
///
/// Only meaningful while the OS enumerates the device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevicePath(String);

impl DevicePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Final path component, e.g. `ttyUSB0`
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl From<String> for DevicePath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl From<&str> for DevicePath {
    fn from(path: &str) -> Self {
        Self(path.to_string())
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally visible connection state
///
/// This is the copyable projection of the controller's internal state
/// machine; it never carries the serial handle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// No discovery has run yet
    Uninitialized,
    /// Discovery is in progress
    Searching,
    /// A device handle is open
    Connected,
    /// Discovery failed or the device went away
    Disconnected,
}

impl ConnectionStatus {
    /// Get a string representation for API responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Uninitialized => "uninitialized",
            ConnectionStatus::Searching => "searching",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
