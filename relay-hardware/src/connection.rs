//! One open handle to one relay board

use relay_core::protocol::CommandFrame;
use relay_core::{DevicePath, RelayError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::serial_driver::{DeviceBackend, RelayTransport};
use crate::settings::DriverSettings;

/// Open connection to a relay board
///
/// Owns the transport for exactly one device node. Sends are spaced by the
/// quiescence period; the board drops frames that arrive too close together.
pub struct RelayConnection {
    transport: Option<Box<dyn RelayTransport>>,
    path: DevicePath,
    backend: Arc<dyn DeviceBackend>,
    quiescence: Duration,
    quiet_until: Option<Instant>,
}

impl RelayConnection {
    /// Open `path` with the configured line settings
    pub fn open(
        backend: Arc<dyn DeviceBackend>,
        path: DevicePath,
        settings: &DriverSettings,
    ) -> Result<Self> {
        let transport = backend.open(&path, settings.baud_rate, settings.timeout)?;
        info!("Opened relay board at {}", path);

        Ok(Self {
            transport: Some(transport),
            path,
            backend,
            quiescence: settings.quiescence,
            quiet_until: None,
        })
    }

    /// Write one frame
    ///
    /// Waits out the quiescence period left by the previous send first.
    pub async fn send(&mut self, frame: &CommandFrame) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(RelayError::NotOpen)?;

        if let Some(deadline) = self.quiet_until.filter(|d| *d > Instant::now()) {
            sleep_until(deadline).await;
        }

        transport.write_frame(frame).await?;
        self.quiet_until = Some(Instant::now() + self.quiescence);
        Ok(())
    }

    /// Bytes the driver has already buffered
    pub async fn read_available(&mut self) -> Result<Vec<u8>> {
        let transport = self.transport.as_mut().ok_or(RelayError::NotOpen)?;
        transport.read_available().await
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Handle open and node still present
    pub fn is_alive(&self) -> bool {
        self.is_open() && self.backend.is_present(&self.path)
    }

    /// Release the handle; safe to call more than once
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            debug!("Closed relay board at {}", self.path);
        }
        self.quiet_until = None;
    }

    pub fn path(&self) -> &DevicePath {
        &self.path
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.close();
    }
}
