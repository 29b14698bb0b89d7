//! Hotplug handling
//!
//! Event sources push `HotplugEvent`s into a bounded channel; the
//! `HotplugMonitor` consumes them and drives the controller. Two sources
//! exist: a udev netlink listener on Linux, and a polling watcher over the
//! device backend for systems where udev is unavailable.

pub mod polling;
#[cfg(target_os = "linux")]
pub mod udev;

use relay_core::{ConnectionStatus, DevicePath};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay_controller::RelayController;

/// Capacity of the event channel between a source and the monitor
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Kernel subsystem the sources listen on
pub const TTY_SUBSYSTEM: &str = "tty";

/// What happened to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotplugAction {
    Add,
    Remove,
    /// change, bind, unbind, ...
    Other,
}

impl HotplugAction {
    pub fn from_udev(action: &str) -> Self {
        match action {
            "add" => HotplugAction::Add,
            "remove" => HotplugAction::Remove,
            _ => HotplugAction::Other,
        }
    }
}

/// One device event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotplugEvent {
    pub action: HotplugAction,
    pub subsystem: Option<String>,
    /// USB vendor id of the parent device, when reported
    pub vendor_id: Option<u16>,
    pub devnode: Option<DevicePath>,
}

impl HotplugEvent {
    /// Event for a `tty` node with a known vendor id
    pub fn tty(action: HotplugAction, vendor_id: u16, devnode: DevicePath) -> Self {
        Self {
            action,
            subsystem: Some(TTY_SUBSYSTEM.to_string()),
            vendor_id: Some(vendor_id),
            devnode: Some(devnode),
        }
    }
}

/// Parse a udev `ID_VENDOR_ID` value such as `1a86`
pub fn parse_vendor_id(value: &str) -> Option<u16> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).ok()
}

/// What the monitor did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Unrelated event, state untouched
    Ignored,
    /// Discovery ran; carries the resulting status
    Rediscovered(ConnectionStatus),
    /// Remove handled; whether a connection was dropped
    Removed(bool),
    /// Shutdown arrived during the settle delay or the discovery
    Cancelled,
}

/// Background consumer of device events
pub struct HotplugMonitor {
    controller: Arc<RelayController>,
    vendor_id: u16,
    settle_delay: Duration,
}

impl HotplugMonitor {
    pub fn new(controller: Arc<RelayController>, vendor_id: u16, settle_delay: Duration) -> Self {
        Self {
            controller,
            vendor_id,
            settle_delay,
        }
    }

    /// Consume events until shutdown or until every sender is gone
    pub async fn run(self, mut events: mpsc::Receiver<HotplugEvent>, shutdown: CancellationToken) {
        info!(
            "Hotplug monitor started (vendor {:04x}, settle {:?})",
            self.vendor_id, self.settle_delay
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        let outcome = self.handle_event(&event, &shutdown).await;
                        debug!("Hotplug {:?} -> {:?}", event.action, outcome);
                    }
                    None => {
                        warn!("Hotplug event source closed");
                        break;
                    }
                },
            }
        }

        info!("Hotplug monitor stopped");
    }

    /// Act on one event
    pub async fn handle_event(
        &self,
        event: &HotplugEvent,
        shutdown: &CancellationToken,
    ) -> EventOutcome {
        if event.vendor_id != Some(self.vendor_id) {
            return EventOutcome::Ignored;
        }
        if let Some(subsystem) = &event.subsystem {
            if subsystem != TTY_SUBSYSTEM {
                return EventOutcome::Ignored;
            }
        }

        let node = event
            .devnode
            .as_ref()
            .map(|p| p.as_str())
            .unwrap_or("<unknown>");

        match event.action {
            HotplugAction::Add => {
                info!("Relay board attached at {}", node);
                tokio::select! {
                    _ = shutdown.cancelled() => return EventOutcome::Cancelled,
                    _ = sleep(self.settle_delay) => {}
                }

                let status = tokio::select! {
                    _ = shutdown.cancelled() => return EventOutcome::Cancelled,
                    status = self.controller.handle_device_added() => status,
                };
                if status != ConnectionStatus::Connected {
                    warn!("Relay board attached but discovery found nothing usable");
                }
                EventOutcome::Rediscovered(status)
            }
            HotplugAction::Remove => {
                info!("Relay board detached from {}", node);
                EventOutcome::Removed(self.controller.handle_device_removed().await)
            }
            HotplugAction::Other => EventOutcome::Ignored,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use crate::settings::{DriverSettings, RetryPolicy};
    use relay_core::{BoardConfig, DefaultBoard};
    use tokio::time::Instant;

    const VID: u16 = DefaultBoard::USB_VID;

    fn setup() -> (MockBackend, Arc<RelayController>, HotplugMonitor) {
        let backend = MockBackend::new();
        let settings = DriverSettings {
            retry: RetryPolicy {
                attempts: 1,
                interval: Duration::from_secs(3),
            },
            ..DriverSettings::default()
        };
        let controller = Arc::new(RelayController::new(Arc::new(backend.clone()), settings));
        let monitor = HotplugMonitor::new(controller.clone(), VID, Duration::from_secs(1));
        (backend, controller, monitor)
    }

    #[test]
    fn test_parse_vendor_id() {
        assert_eq!(parse_vendor_id("1a86"), Some(0x1A86));
        assert_eq!(parse_vendor_id("1A86\n"), Some(0x1A86));
        assert_eq!(parse_vendor_id("0x0403"), Some(0x0403));
        assert_eq!(parse_vendor_id("zz"), None);
        assert_eq!(parse_vendor_id(""), None);
    }

    #[test]
    fn test_action_from_udev() {
        assert_eq!(HotplugAction::from_udev("add"), HotplugAction::Add);
        assert_eq!(HotplugAction::from_udev("remove"), HotplugAction::Remove);
        assert_eq!(HotplugAction::from_udev("change"), HotplugAction::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_waits_for_settle_then_connects() {
        let (backend, controller, monitor) = setup();
        controller.initialize().await;
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);

        backend.attach("/dev/ttyUSB0");
        let start = Instant::now();
        let outcome = monitor
            .handle_event(
                &HotplugEvent::tty(HotplugAction::Add, VID, "/dev/ttyUSB0".into()),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, EventOutcome::Rediscovered(ConnectionStatus::Connected));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(controller.open_channel(1, false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_without_usable_node_stays_disconnected() {
        let (_backend, controller, monitor) = setup();
        controller.initialize().await;

        let outcome = monitor
            .handle_event(
                &HotplugEvent::tty(HotplugAction::Add, VID, "/dev/ttyUSB0".into()),
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(
            outcome,
            EventOutcome::Rediscovered(ConnectionStatus::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_is_immediate() {
        let (backend, controller, monitor) = setup();
        backend.attach("/dev/ttyUSB0");
        controller.initialize().await;

        backend.detach("/dev/ttyUSB0");
        let start = Instant::now();
        let outcome = monitor
            .handle_event(
                &HotplugEvent::tty(HotplugAction::Remove, VID, "/dev/ttyUSB0".into()),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, EventOutcome::Removed(true));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
        assert_eq!(backend.live_handles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_events_are_ignored() {
        let (backend, controller, monitor) = setup();
        backend.attach("/dev/ttyUSB0");
        controller.initialize().await;
        let token = CancellationToken::new();

        let foreign = HotplugEvent::tty(HotplugAction::Remove, 0x0403, "/dev/ttyUSB0".into());
        assert_eq!(monitor.handle_event(&foreign, &token).await, EventOutcome::Ignored);

        let no_vendor = HotplugEvent {
            action: HotplugAction::Remove,
            subsystem: Some("tty".to_string()),
            vendor_id: None,
            devnode: None,
        };
        assert_eq!(monitor.handle_event(&no_vendor, &token).await, EventOutcome::Ignored);

        let change = HotplugEvent::tty(HotplugAction::Other, VID, "/dev/ttyUSB0".into());
        assert_eq!(monitor.handle_event(&change, &token).await, EventOutcome::Ignored);

        let other_subsystem = HotplugEvent {
            subsystem: Some("usb".to_string()),
            ..HotplugEvent::tty(HotplugAction::Remove, VID, "/dev/ttyUSB0".into())
        };
        assert_eq!(
            monitor.handle_event(&other_subsystem, &token).await,
            EventOutcome::Ignored
        );

        assert_eq!(controller.status(), ConnectionStatus::Connected);
        assert_eq!(backend.live_handles(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_delay_is_cancellable() {
        let (backend, controller, monitor) = setup();
        controller.initialize().await;
        backend.attach("/dev/ttyUSB0");

        let token = CancellationToken::new();
        token.cancel();
        let outcome = monitor
            .handle_event(
                &HotplugEvent::tty(HotplugAction::Add, VID, "/dev/ttyUSB0".into()),
                &token,
            )
            .await;

        assert_eq!(outcome, EventOutcome::Cancelled);
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_is_cancellable() {
        // Full retry window: 5 attempts, 12 s without a board
        let controller = Arc::new(RelayController::new(
            Arc::new(MockBackend::new()),
            DriverSettings::default(),
        ));
        let monitor = HotplugMonitor::new(controller, VID, Duration::from_secs(1));

        let token = CancellationToken::new();
        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                sleep(Duration::from_secs(3)).await;
                token.cancel();
            })
        };

        let start = Instant::now();
        let outcome = monitor
            .handle_event(
                &HotplugEvent::tty(HotplugAction::Add, VID, "/dev/ttyUSB0".into()),
                &token,
            )
            .await;

        assert_eq!(outcome, EventOutcome::Cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_consumes_until_cancelled() {
        let (backend, controller, monitor) = setup();
        controller.initialize().await;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let task = tokio::spawn(monitor.run(rx, token.clone()));

        backend.attach("/dev/ttyUSB0");
        tx.send(HotplugEvent::tty(HotplugAction::Add, VID, "/dev/ttyUSB0".into()))
            .await
            .unwrap();

        let mut status = controller.subscribe();
        status
            .wait_for(|snapshot| snapshot.status == ConnectionStatus::Connected)
            .await
            .unwrap();

        token.cancel();
        task.await.unwrap();
        assert!(tx.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exits_when_source_closes() {
        let (_backend, controller, monitor) = setup();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        drop(tx);

        monitor.run(rx, CancellationToken::new()).await;
        assert_eq!(controller.status(), ConnectionStatus::Uninitialized);
    }
}
