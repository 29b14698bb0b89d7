//! Serial driver for low-level hardware communication
//!
//! Provides the transport and backend traits the rest of the crate is written
//! against, and their implementations on top of `tokio-serial` and `/dev`.

use async_trait::async_trait;
use relay_core::protocol::{hex_string, CommandFrame};
use relay_core::{DevicePath, RelayError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, warn};

use crate::hotplug::parse_vendor_id;

/// Trait for serial transport abstraction
///
/// One open handle to one device node. Dropping the transport releases the
/// handle.
#[async_trait]
pub trait RelayTransport: Send {
    /// Write a complete frame and flush it
    async fn write_frame(&mut self, frame: &CommandFrame) -> Result<()>;

    /// Return whatever bytes are already buffered, without waiting
    async fn read_available(&mut self) -> Result<Vec<u8>>;
}

/// Access to device nodes
///
/// Separates the driver from the operating system so discovery, liveness,
/// and reconnection can run against a simulated board.
pub trait DeviceBackend: Send + Sync {
    /// List nodes whose file name starts with `prefix`, in lexical order
    fn list_nodes(&self, prefix: &str) -> Result<Vec<DevicePath>>;

    /// Whether the node is currently present
    fn is_present(&self, path: &DevicePath) -> bool;

    /// USB vendor id of the device behind the node, when it can be read
    fn vendor_id(&self, path: &DevicePath) -> Option<u16>;

    /// Open a serial handle on the node
    fn open(
        &self,
        path: &DevicePath,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn RelayTransport>>;
}

/// Serial driver for hardware communication
pub struct SerialDriver {
    port: SerialStream,
    port_path: String,
    timeout_duration: Duration,
}

impl SerialDriver {
    /// Open a serial port at `baud_rate`, 8N1, no flow control
    ///
    /// # Arguments
    /// * `port_path` - Path to the serial device (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed (9600 for CH341 relay boards)
    /// * `timeout` - Timeout for open, write, and flush
    pub fn open(port_path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        debug!("Opening serial port: {}", port_path);

        let port = tokio_serial::new(port_path, baud_rate)
            .timeout(timeout)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                debug!("Failed to open serial port {}: {}", port_path, e);
                RelayError::Open {
                    path: port_path.to_string(),
                    reason: e.to_string(),
                }
            })?;

        debug!("Serial port {} opened at {} baud", port_path, baud_rate);

        Ok(Self {
            port,
            port_path: port_path.to_string(),
            timeout_duration: timeout,
        })
    }
}

#[async_trait]
impl RelayTransport for SerialDriver {
    async fn write_frame(&mut self, frame: &CommandFrame) -> Result<()> {
        debug!("TX {}: {}", self.port_path, frame);

        timeout(self.timeout_duration, self.port.write_all(frame.as_bytes()))
            .await
            .map_err(|_| {
                error!("Write timeout on {}", self.port_path);
                RelayError::Serial("Write operation timed out".to_string())
            })?
            .map_err(|e| {
                error!("Write failed on {}: {}", self.port_path, e);
                RelayError::Serial(format!("Write failed: {}", e))
            })?;

        timeout(self.timeout_duration, self.port.flush())
            .await
            .map_err(|_| RelayError::Serial("Flush operation timed out".to_string()))?
            .map_err(|e| RelayError::Serial(format!("Flush failed: {}", e)))?;

        Ok(())
    }

    async fn read_available(&mut self) -> Result<Vec<u8>> {
        let pending = self.port.bytes_to_read().map_err(|e| {
            warn!("Failed to query input buffer on {}: {}", self.port_path, e);
            RelayError::Serial(format!("Failed to query input buffer: {}", e))
        })? as usize;

        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending];
        timeout(self.timeout_duration, self.port.read_exact(&mut buf))
            .await
            .map_err(|_| RelayError::Serial("Read operation timed out".to_string()))?
            .map_err(|e| {
                error!("Read error on {}: {}", self.port_path, e);
                RelayError::Serial(format!("Read error: {}", e))
            })?;

        debug!("RX {}: {}", self.port_path, hex_string(&buf));
        Ok(buf)
    }
}

/// Root of the sysfs tree holding `class/tty`
const SYSFS_DIR: &str = "/sys";

/// Device backend for the running system
///
/// Lists nodes from a device directory (normally `/dev`), reads vendor ids
/// from sysfs, and opens nodes with `tokio-serial`.
#[derive(Debug, Clone)]
pub struct SystemBackend {
    device_dir: PathBuf,
    sysfs_dir: PathBuf,
}

impl SystemBackend {
    pub fn new(device_dir: impl AsRef<Path>) -> Self {
        Self {
            device_dir: device_dir.as_ref().to_path_buf(),
            sysfs_dir: PathBuf::from(SYSFS_DIR),
        }
    }

    /// Read vendor ids below `sysfs_dir` instead of `/sys`
    pub fn with_sysfs_dir(mut self, sysfs_dir: impl AsRef<Path>) -> Self {
        self.sysfs_dir = sysfs_dir.as_ref().to_path_buf();
        self
    }
}

impl Default for SystemBackend {
    fn default() -> Self {
        use relay_core::BoardConfig;
        Self::new(relay_core::DefaultBoard::DEVICE_DIR)
    }
}

impl DeviceBackend for SystemBackend {
    fn list_nodes(&self, prefix: &str) -> Result<Vec<DevicePath>> {
        let entries = std::fs::read_dir(&self.device_dir).map_err(|e| {
            error!(
                "Failed to read device directory {}: {}",
                self.device_dir.display(),
                e
            );
            RelayError::Io(e)
        })?;

        let mut nodes: Vec<DevicePath> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
            .map(|entry| DevicePath::new(entry.path().to_string_lossy().into_owned()))
            .collect();
        nodes.sort();

        Ok(nodes)
    }

    fn is_present(&self, path: &DevicePath) -> bool {
        Path::new(path.as_str()).exists()
    }

    fn vendor_id(&self, path: &DevicePath) -> Option<u16> {
        let link = self
            .sysfs_dir
            .join("class/tty")
            .join(path.file_name())
            .join("device");
        let device = std::fs::canonicalize(link).ok()?;

        // usb-serial ports sit two levels below the USB device, vendor
        // drivers bind the interface one level below it
        device.ancestors().take(3).find_map(|dir| {
            std::fs::read_to_string(dir.join("idVendor"))
                .ok()
                .and_then(|value| parse_vendor_id(&value))
        })
    }

    fn open(
        &self,
        path: &DevicePath,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn RelayTransport>> {
        let driver = SerialDriver::open(path.as_str(), baud_rate, timeout)?;
        Ok(Box::new(driver))
    }
}
