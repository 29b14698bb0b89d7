//! Polling event source
//!
//! Used where a udev subscription is not possible, and in mock mode. Samples
//! the scanner's candidate nodes at a fixed interval and reports presence
//! edges as add/remove events. Each event carries the vendor id the backend
//! reported for the node while it was present, so the monitor can still tell
//! the relay board from other USB serial adapters.

use relay_core::DevicePath;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{HotplugAction, HotplugEvent, TTY_SUBSYSTEM};
use crate::port_scanner::PortScanner;

/// Present nodes and their vendor ids
type Sample = BTreeMap<DevicePath, Option<u16>>;

/// Presence watcher over the device backend
pub struct PollingWatcher {
    scanner: PortScanner,
    period: Duration,
}

impl PollingWatcher {
    pub fn new(scanner: PortScanner, period: Duration) -> Self {
        Self { scanner, period }
    }

    fn sample(&self) -> Sample {
        let backend = self.scanner.backend();
        self.scanner
            .candidates()
            .into_iter()
            .filter(|path| backend.is_present(path))
            .map(|path| {
                let vendor_id = backend.vendor_id(&path);
                (path, vendor_id)
            })
            .collect()
    }

    /// Events for the difference between two samples, removals first
    fn diff(before: &Sample, after: &Sample) -> Vec<HotplugEvent> {
        let removed = before
            .iter()
            .filter(|(path, _)| !after.contains_key(*path))
            .map(|(path, vendor_id)| edge(HotplugAction::Remove, path, *vendor_id));
        let added = after
            .iter()
            .filter(|(path, _)| !before.contains_key(*path))
            .map(|(path, vendor_id)| edge(HotplugAction::Add, path, *vendor_id));
        removed.chain(added).collect()
    }

    /// Sample until shutdown or until the monitor goes away
    ///
    /// Nodes present at startup are the baseline and produce no events.
    pub async fn run(self, events: mpsc::Sender<HotplugEvent>, shutdown: CancellationToken) {
        info!("Polling for device changes every {:?}", self.period);

        let mut known = self.sample();
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let current = self.sample();
            for event in Self::diff(&known, &current) {
                debug!(
                    "Polling: {:?} {:?} (vendor {:?})",
                    event.action, event.devnode, event.vendor_id
                );
                if events.send(event).await.is_err() {
                    debug!("Hotplug monitor gone, stopping polling");
                    return;
                }
            }
            known = current;
        }

        debug!("Polling watcher stopped");
    }
}

fn edge(action: HotplugAction, path: &DevicePath, vendor_id: Option<u16>) -> HotplugEvent {
    HotplugEvent {
        action,
        subsystem: Some(TTY_SUBSYSTEM.to_string()),
        vendor_id,
        devnode: Some(path.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotplug::HotplugMonitor;
    use crate::mock::MockBackend;
    use crate::relay_controller::RelayController;
    use crate::settings::DriverSettings;
    use relay_core::ConnectionStatus;
    use std::sync::Arc;
    use tokio::time::sleep;

    const VID: u16 = 0x1A86;
    const FTDI_VID: u16 = 0x0403;

    fn watcher(backend: &MockBackend) -> PollingWatcher {
        let scanner = PortScanner::new(Arc::new(backend.clone()), DriverSettings::default());
        PollingWatcher::new(scanner, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_edges_become_events() {
        let backend = MockBackend::new();
        backend.attach("/dev/ttyUSB0");
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(watcher(&backend).run(tx, token.clone()));
        sleep(Duration::from_millis(10)).await;

        backend.detach("/dev/ttyUSB0");
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.action, HotplugAction::Remove);
        assert_eq!(removed.vendor_id, Some(VID));
        assert_eq!(removed.devnode, Some(DevicePath::new("/dev/ttyUSB0")));

        backend.attach("/dev/ttyCH341USB0");
        let added = rx.recv().await.unwrap();
        assert_eq!(added.action, HotplugAction::Add);
        assert_eq!(added.vendor_id, Some(VID));
        assert_eq!(added.devnode, Some(DevicePath::new("/dev/ttyCH341USB0")));

        token.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_carry_the_node_vendor() {
        let backend = MockBackend::new();
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let task = tokio::spawn(watcher(&backend).run(tx, token.clone()));
        sleep(Duration::from_millis(10)).await;

        backend.attach_with_vendor("/dev/ttyUSB0", Some(FTDI_VID));
        let added = rx.recv().await.unwrap();
        assert_eq!(added.action, HotplugAction::Add);
        assert_eq!(added.vendor_id, Some(FTDI_VID));

        // The node is gone by the time its removal is seen, so the vendor
        // comes from the previous sample
        backend.detach("/dev/ttyUSB0");
        let removed = rx.recv().await.unwrap();
        assert_eq!(removed.action, HotplugAction::Remove);
        assert_eq!(removed.vendor_id, Some(FTDI_VID));

        backend.attach_with_vendor("/dev/ttyUSB1", None);
        assert_eq!(rx.recv().await.unwrap().vendor_id, None);

        token.cancel();
        task.await.unwrap();
    }

    #[test]
    fn test_diff_orders_removals_first() {
        let before: Sample = [(DevicePath::new("/dev/ttyUSB0"), Some(VID))].into();
        let after: Sample = [(DevicePath::new("/dev/ttyUSB1"), Some(FTDI_VID))].into();

        let events = PollingWatcher::diff(&before, &after);
        let actions: Vec<HotplugAction> = events.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![HotplugAction::Remove, HotplugAction::Add]);
        assert_eq!(events[0].vendor_id, Some(VID));
        assert_eq!(events[1].vendor_id, Some(FTDI_VID));
        assert!(PollingWatcher::diff(&after, &after).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_adapter_leaves_relay_connected() {
        let backend = MockBackend::new();
        backend.attach("/dev/ttyUSB1");
        let controller = Arc::new(RelayController::new(
            Arc::new(backend.clone()),
            DriverSettings::default(),
        ));
        controller.initialize().await;

        let (tx, rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let monitor = HotplugMonitor::new(controller.clone(), VID, Duration::from_secs(1));
        let monitor = tokio::spawn(monitor.run(rx, token.clone()));
        let polling = tokio::spawn(watcher(&backend).run(tx, token.clone()));
        sleep(Duration::from_millis(10)).await;

        // Sorts ahead of the relay node, so a rediscovery would pick it
        backend.attach_with_vendor("/dev/ttyUSB0", Some(FTDI_VID));
        sleep(Duration::from_secs(5)).await;
        assert_eq!(
            controller.device_path(),
            Some(DevicePath::new("/dev/ttyUSB1"))
        );
        assert_eq!(controller.reconnect_count(), 0);

        backend.detach("/dev/ttyUSB0");
        sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.status(), ConnectionStatus::Connected);
        assert_eq!(
            controller.device_path(),
            Some(DevicePath::new("/dev/ttyUSB1"))
        );
        assert!(controller.open_channel(1, false).await);

        token.cancel();
        monitor.await.unwrap();
        polling.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_when_monitor_is_gone() {
        let backend = MockBackend::new();
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let task = tokio::spawn(watcher(&backend).run(tx, CancellationToken::new()));
        sleep(Duration::from_millis(10)).await;

        backend.attach("/dev/ttyUSB0");
        task.await.unwrap();
    }
}
