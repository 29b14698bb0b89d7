//! udev event source (Linux)
//!
//! Listens on the kernel netlink socket for `tty` events and forwards them to
//! the monitor. The socket is read on a blocking thread and polled with a
//! short timeout so cancellation is noticed promptly.

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use relay_core::{DevicePath, RelayError, Result};
use std::os::fd::AsFd;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace};

use super::{parse_vendor_id, HotplugAction, HotplugEvent, TTY_SUBSYSTEM};

/// How long one poll waits before checking for shutdown
const POLL_TIMEOUT_MS: u16 = 250;

/// Subscribe to udev and forward events until shutdown
///
/// Returns once the subscription is established, or with the error that
/// prevented it. The listener itself runs on a blocking thread owned by
/// `tracker`.
pub async fn start(
    tracker: &TaskTracker,
    events: mpsc::Sender<HotplugEvent>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (ready_tx, ready_rx) = oneshot::channel();
    tracker.spawn_blocking(move || monitor_blocking(events, shutdown, ready_tx));

    ready_rx
        .await
        .map_err(|_| RelayError::Hotplug("udev listener exited before subscribing".to_string()))?
}

fn subscribe() -> Result<::udev::MonitorSocket> {
    ::udev::MonitorBuilder::new()
        .and_then(|builder| builder.match_subsystem(TTY_SUBSYSTEM))
        .and_then(|builder| builder.listen())
        .map_err(|e| RelayError::Hotplug(format!("udev subscription failed: {}", e)))
}

fn monitor_blocking(
    events: mpsc::Sender<HotplugEvent>,
    shutdown: CancellationToken,
    ready: oneshot::Sender<Result<()>>,
) {
    let socket = match subscribe() {
        Ok(socket) => {
            let _ = ready.send(Ok(()));
            socket
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    info!("Listening for udev {} events", TTY_SUBSYSTEM);

    while !shutdown.is_cancelled() {
        let mut fds = [PollFd::new(socket.as_fd(), PollFlags::POLLIN)];

        match poll(&mut fds, PollTimeout::from(POLL_TIMEOUT_MS)) {
            Ok(0) => continue,
            Ok(_) => {}
            Err(Errno::EINTR) => continue,
            Err(e) => {
                error!("Polling the udev socket failed: {}", e);
                break;
            }
        }

        for event in socket.iter() {
            let event = convert(&event);
            trace!("udev event: {:?}", event);
            if events.blocking_send(event).is_err() {
                debug!("Hotplug monitor gone, stopping udev listener");
                return;
            }
        }
    }

    debug!("udev listener stopped");
}

fn convert(event: &::udev::Event) -> HotplugEvent {
    let action = match event.event_type() {
        ::udev::EventType::Add => HotplugAction::Add,
        ::udev::EventType::Remove => HotplugAction::Remove,
        _ => HotplugAction::Other,
    };

    let vendor_id = event
        .property_value("ID_VENDOR_ID")
        .and_then(|value| parse_vendor_id(&value.to_string_lossy()))
        .or_else(|| {
            // Not every rule set exports the property; the parent USB
            // device still carries it while attached
            event
                .parent_with_subsystem_devtype("usb", "usb_device")
                .ok()
                .flatten()
                .and_then(|usb| {
                    usb.attribute_value("idVendor")
                        .and_then(|value| parse_vendor_id(&value.to_string_lossy()))
                })
        });

    HotplugEvent {
        action,
        subsystem: event
            .subsystem()
            .map(|s| s.to_string_lossy().into_owned()),
        vendor_id,
        devnode: event
            .devnode()
            .map(|node| DevicePath::new(node.to_string_lossy().into_owned())),
    }
}
