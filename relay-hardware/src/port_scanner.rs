//! Device discovery
//!
//! Finds a usable relay board by listing device nodes under the known naming
//! conventions and probing each one in order. The vendor-specific driver name
//! (`ttyCH341USB*`) is searched before the generic one (`ttyUSB*`).

use relay_core::DevicePath;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::serial_driver::DeviceBackend;
use crate::settings::DriverSettings;

/// Enumerates and probes candidate device nodes
#[derive(Clone)]
pub struct PortScanner {
    backend: Arc<dyn DeviceBackend>,
    settings: DriverSettings,
}

impl PortScanner {
    pub fn new(backend: Arc<dyn DeviceBackend>, settings: DriverSettings) -> Self {
        Self { backend, settings }
    }

    /// Candidate nodes in search order
    ///
    /// With a configured device path the list is exactly that path, whether
    /// or not the node currently exists.
    pub fn candidates(&self) -> Vec<DevicePath> {
        if let Some(path) = &self.settings.device_path {
            return vec![DevicePath::new(path.as_str())];
        }

        let mut candidates = Vec::new();
        for prefix in &self.settings.name_prefixes {
            match self.backend.list_nodes(prefix) {
                Ok(nodes) => candidates.extend(nodes),
                Err(e) => debug!("Listing {}* failed: {}", prefix, e),
            }
        }
        candidates
    }

    /// Open the node and close it again
    ///
    /// A failure only means the node is not usable right now.
    pub fn probe(&self, path: &DevicePath) -> bool {
        match self
            .backend
            .open(path, self.settings.baud_rate, self.settings.timeout)
        {
            Ok(transport) => {
                drop(transport);
                debug!("Probe {}: ok", path);
                true
            }
            Err(e) => {
                debug!("Probe {}: {}", path, e);
                false
            }
        }
    }

    /// One pass over the candidates; the first node that probes wins
    pub fn scan_once(&self) -> Option<DevicePath> {
        self.candidates()
            .into_iter()
            .find(|candidate| self.probe(candidate))
    }

    /// Scan with bounded retry
    ///
    /// Sleeps between attempts but not after the last one, so a full miss
    /// costs `(attempts - 1) * interval`.
    pub async fn discover(&self) -> Option<DevicePath> {
        let retry = self.settings.retry;
        let attempts = retry.attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(path) = self.scan_once() {
                info!("Found relay board at {} (attempt {})", path, attempt);
                return Some(path);
            }

            if attempt < attempts {
                debug!(
                    "No relay board found (attempt {}/{}), retrying in {:?}",
                    attempt, attempts, retry.interval
                );
                sleep(retry.interval).await;
            }
        }

        warn!("No relay board found after {} attempts", attempts);
        None
    }

    pub fn backend(&self) -> &Arc<dyn DeviceBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }
}
