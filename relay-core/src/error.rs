//! Error types for the relay driver

use thiserror::Error;

/// Core error type for relay operations
///
/// None of these are fatal to the daemon: the controller reports them to its
/// callers as `false`/empty results and logs them.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Discovery exhausted its retries without a usable device
    #[error("Device not found")]
    DeviceNotFound,

    /// The serial handle could not be opened (permission, driver, busy)
    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// A send was attempted without an open handle
    #[error("Serial port is not open")]
    NotOpen,

    /// Liveness check failed or a matching remove event arrived
    #[error("Connection lost: {0}")]
    LostConnection(String),

    /// The status query window elapsed without any bytes
    #[error("No response within {0}")]
    ProtocolTimeout(String),

    /// Serial port I/O errors on an open handle
    #[error("Serial port error: {0}")]
    Serial(String),

    /// Channel outside the addressable range
    #[error("Invalid channel: {channel} (must be 1-{max})")]
    InvalidChannel { channel: u16, max: u8 },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Device-event subscription errors
    #[error("Hotplug error: {0}")]
    Hotplug(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl From<toml::de::Error> for RelayError {
    fn from(err: toml::de::Error) -> Self {
        RelayError::Config(err.to_string())
    }
}

impl RelayError {
    /// Whether the error means the device itself went away
    ///
    /// Used after a failed write to decide if the connection should be
    /// dropped rather than kept for the next request.
    pub fn is_disconnect(&self) -> bool {
        match self {
            RelayError::LostConnection(_) | RelayError::NotOpen => true,
            RelayError::Serial(msg) => {
                let msg_lower = msg.to_lowercase();
                msg_lower.contains("broken pipe")
                    || msg_lower.contains("no such device")
                    || msg_lower.contains("device not configured")
                    || msg_lower.contains("input/output error")
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no node");
        let err: RelayError = io_err.into();

        match err {
            RelayError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: RelayError = toml_err.into();
        assert!(matches!(err, RelayError::Config(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RelayError::Open {
            path: "/dev/ttyUSB0".to_string(),
            reason: "Permission denied".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Failed to open /dev/ttyUSB0: Permission denied"
        );

        let err = RelayError::InvalidChannel {
            channel: 0,
            max: 16,
        };
        assert_eq!(format!("{}", err), "Invalid channel: 0 (must be 1-16)");

        assert_eq!(format!("{}", RelayError::DeviceNotFound), "Device not found");
        assert_eq!(
            format!("{}", RelayError::NotOpen),
            "Serial port is not open"
        );
    }

    #[test]
    fn test_is_disconnect() {
        assert!(RelayError::LostConnection("removed".to_string()).is_disconnect());
        assert!(RelayError::NotOpen.is_disconnect());
        assert!(RelayError::Serial("Broken pipe".to_string()).is_disconnect());
        assert!(RelayError::Serial("Input/output error".to_string()).is_disconnect());
        assert!(!RelayError::Serial("Write timed out".to_string()).is_disconnect());
        assert!(!RelayError::ProtocolTimeout("200ms".to_string()).is_disconnect());
        assert!(!RelayError::DeviceNotFound.is_disconnect());
    }
}
