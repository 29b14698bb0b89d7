//! Hotplug wiring
//!
//! Picks the event source (udev, or polling when udev is unavailable or in
//! mock mode) and starts the monitor task on the daemon's task tracker. The
//! monitor is started before startup discovery, which then runs as a tracked
//! task of its own.

use anyhow::{bail, Result};
use relay_core::config::HotplugConfig;
use relay_core::{BoardConfig, ConnectionStatus, DefaultBoard};
use relay_hardware::hotplug::polling::PollingWatcher;
use relay_hardware::hotplug::{HotplugEvent, EVENT_CHANNEL_CAPACITY};
use relay_hardware::{HotplugMonitor, RelayController};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Where hotplug events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventSource {
    Udev,
    Polling,
    Disabled,
}

/// Start the event source and the monitor
///
/// Fails only when udev cannot be subscribed and the polling fallback is
/// disabled.
pub(crate) async fn start_monitor(
    config: &HotplugConfig,
    controller: Arc<RelayController>,
    mock: bool,
    tracker: &TaskTracker,
    shutdown: CancellationToken,
) -> Result<EventSource> {
    if !config.enabled {
        info!("Hotplug monitoring disabled");
        return Ok(EventSource::Disabled);
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let source = if mock {
        start_polling(config, &controller, tx, tracker, shutdown.clone());
        EventSource::Polling
    } else {
        match start_udev(tracker, tx.clone(), shutdown.clone()).await {
            Ok(()) => EventSource::Udev,
            Err(e) if config.fallback_to_polling => {
                warn!("{}; falling back to polling", e);
                start_polling(config, &controller, tx, tracker, shutdown.clone());
                EventSource::Polling
            }
            Err(e) => bail!(
                "{} and hotplug.fallback_to_polling is disabled. \
                 Enable it or set hotplug.enabled = false.",
                e
            ),
        }
    };

    let monitor = HotplugMonitor::new(controller, DefaultBoard::USB_VID, config.settle_delay());
    tracker.spawn(monitor.run(rx, shutdown));

    Ok(source)
}

/// Run startup discovery unless shutdown comes first
pub(crate) async fn startup_discovery(controller: Arc<RelayController>, shutdown: CancellationToken) {
    let status = tokio::select! {
        _ = shutdown.cancelled() => {
            info!("Startup discovery cancelled");
            return;
        }
        status = controller.initialize() => status,
    };

    match (status, controller.device_path()) {
        (ConnectionStatus::Connected, Some(path)) => info!("Relay board connected at {}", path),
        (status, _) => warn!(
            "No relay board connected ({}); waiting for it to be plugged in",
            status
        ),
    }
}

fn start_polling(
    config: &HotplugConfig,
    controller: &RelayController,
    tx: mpsc::Sender<HotplugEvent>,
    tracker: &TaskTracker,
    shutdown: CancellationToken,
) {
    let watcher = PollingWatcher::new(controller.scanner().clone(), config.poll_interval());
    tracker.spawn(watcher.run(tx, shutdown));
}

#[cfg(target_os = "linux")]
async fn start_udev(
    tracker: &TaskTracker,
    tx: mpsc::Sender<HotplugEvent>,
    shutdown: CancellationToken,
) -> relay_core::Result<()> {
    relay_hardware::hotplug::udev::start(tracker, tx, shutdown).await
}

#[cfg(not(target_os = "linux"))]
async fn start_udev(
    _tracker: &TaskTracker,
    _tx: mpsc::Sender<HotplugEvent>,
    _shutdown: CancellationToken,
) -> relay_core::Result<()> {
    Err(relay_core::RelayError::Hotplug(
        "udev is only available on Linux".to_string(),
    ))
}
