//! Board definitions and configuration
//!
//! Relay boards are identified by the USB-to-serial bridge chip they carry
//! rather than by the relay module itself. Each supported bridge implements
//! the `BoardConfig` trait with its USB identifiers, line settings, and the
//! device-node naming conventions its kernel drivers use.
//!
//! Note: Actual hardware I/O is in the `relay-hardware` crate. This module only
//! contains board specifications.

/// Hardware board configuration trait
///
/// # Example
///
/// ```
/// use relay_core::board::{BoardConfig, Ch341Relay};
///
/// const VID: u16 = Ch341Relay::USB_VID;
/// const BAUD: u32 = Ch341Relay::BAUD_RATE;
/// ```
pub trait BoardConfig: Send + Sync + 'static {
    /// Human-readable board name
    const NAME: &'static str;

    /// USB Vendor ID of the serial bridge, used to filter hotplug events
    const USB_VID: u16;

    /// USB Product ID of the serial bridge
    const USB_PID: u16;

    /// Serial communication baud rate
    const BAUD_RATE: u32;

    /// Timeout used when opening or probing the port, in milliseconds
    const DEFAULT_TIMEOUT_MS: u64;

    /// Directory holding the device nodes
    const DEVICE_DIR: &'static str;

    /// Device node name prefixes, in the order they are searched
    ///
    /// The vendor driver's naming comes first, the generic USB-serial
    /// naming second.
    const DEVICE_NAME_PREFIXES: &'static [&'static str];
}

/// CH340/CH341-based multi-channel relay board
///
/// - USB VID: 0x1A86 (Nanjing QinHeng / WCH)
/// - USB PID: 0x5523 (CH341 in serial mode)
/// - 9600 baud, 8N1
/// - Nodes appear as `/dev/ttyCH341USB*` with the vendor driver, or as
///   `/dev/ttyUSB*` with the in-tree `ch341` driver
pub struct Ch341Relay;

impl BoardConfig for Ch341Relay {
    const NAME: &'static str = "CH341 USB Relay";
    const USB_VID: u16 = 0x1A86;
    const USB_PID: u16 = 0x5523;
    const BAUD_RATE: u32 = 9600;
    const DEFAULT_TIMEOUT_MS: u64 = 500;
    const DEVICE_DIR: &'static str = "/dev";
    const DEVICE_NAME_PREFIXES: &'static [&'static str] = &["ttyCH341USB", "ttyUSB"];
}

/// Default board type used throughout the codebase
pub type DefaultBoard = Ch341Relay;

/// Runtime board information (non-generic)
///
/// Carries the compile-time `BoardConfig` constants in a form that can be
/// serialized into API responses.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoardInfo {
    /// Human-readable board name
    pub name: String,
    /// USB Vendor ID
    pub usb_vid: u16,
    /// USB Product ID
    pub usb_pid: u16,
    /// Serial communication baud rate
    pub baud_rate: u32,
    /// Highest channel number the daemon will address
    pub max_channel: u8,
}

impl BoardInfo {
    /// Build runtime info for board `B` with the configured channel limit
    pub fn for_board<B: BoardConfig>(max_channel: u8) -> Self {
        Self {
            name: B::NAME.to_string(),
            usb_vid: B::USB_VID,
            usb_pid: B::USB_PID,
            baud_rate: B::BAUD_RATE,
            max_channel,
        }
    }
}
