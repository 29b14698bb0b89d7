//! Relay controller
//!
//! The single entry point for everything that touches the board. Request
//! handlers and the hotplug monitor share one `Arc<RelayController>`; every
//! change to the connection goes through its one lock, so a handle is never
//! written to while it is being swapped out.

use relay_core::protocol::Opcode;
use relay_core::{encode, Channel, CommandFrame, ConnectionStatus, DevicePath, RelayError, Result};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::connection::RelayConnection;
use crate::port_scanner::PortScanner;
use crate::serial_driver::DeviceBackend;
use crate::settings::DriverSettings;

/// Connection state machine
///
/// Only `Connected` carries a connection, so there is no way to hold a handle
/// while claiming to be disconnected.
pub enum ConnectionState {
    /// No discovery has run yet
    Uninitialized,
    /// Discovery is in progress
    Searching,
    /// A board is open
    Connected(RelayConnection),
    /// Discovery failed or the board went away
    Disconnected,
}

impl ConnectionState {
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Uninitialized => ConnectionStatus::Uninitialized,
            ConnectionState::Searching => ConnectionStatus::Searching,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
        }
    }

    fn device_path(&self) -> Option<DevicePath> {
        match self {
            ConnectionState::Connected(conn) => Some(conn.path().clone()),
            _ => None,
        }
    }
}

/// Published view of the controller state
///
/// Readable without taking the controller lock, so status reporting never
/// waits behind a running discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: ConnectionStatus,
    pub device_path: Option<DevicePath>,
    /// When the controller last left `Connected`
    pub last_disconnect: Option<Instant>,
}

/// Façade over discovery, connection, and reconnection
pub struct RelayController {
    state: Mutex<ConnectionState>,
    scanner: PortScanner,
    backend: Arc<dyn DeviceBackend>,
    settings: DriverSettings,
    snapshot: watch::Sender<StatusSnapshot>,
    /// Successful connections after the first one
    reconnect_count: AtomicU32,
    ever_connected: AtomicBool,
}

impl RelayController {
    pub fn new(backend: Arc<dyn DeviceBackend>, settings: DriverSettings) -> Self {
        let (snapshot, _) = watch::channel(StatusSnapshot {
            status: ConnectionStatus::Uninitialized,
            device_path: None,
            last_disconnect: None,
        });

        Self {
            state: Mutex::new(ConnectionState::Uninitialized),
            scanner: PortScanner::new(backend.clone(), settings.clone()),
            backend,
            settings,
            snapshot,
            reconnect_count: AtomicU32::new(0),
            ever_connected: AtomicBool::new(false),
        }
    }

    /// Run startup discovery
    pub async fn initialize(&self) -> ConnectionStatus {
        info!("Searching for relay board");
        let mut state = self.state.lock().await;
        self.rediscover_status(&mut state).await
    }

    /// Switch a channel on
    pub async fn open_channel(&self, channel: u8, feedback: bool) -> bool {
        self.report(
            channel,
            self.send_command(channel, Opcode::switch(true, feedback))
                .await,
        )
    }

    /// Switch a channel off
    pub async fn close_channel(&self, channel: u8, feedback: bool) -> bool {
        self.report(
            channel,
            self.send_command(channel, Opcode::switch(false, feedback))
                .await,
        )
    }

    pub async fn toggle_channel(&self, channel: u8) -> bool {
        self.report(channel, self.send_command(channel, Opcode::Toggle).await)
    }

    /// Query a channel; empty when nothing came back
    pub async fn query_status(&self, channel: u8) -> Vec<u8> {
        match self.try_query_status(channel).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Status query on channel {} failed: {}", channel, e);
                Vec::new()
            }
        }
    }

    /// Encode and send one command
    ///
    /// Rejects bad channels before any I/O. A connection whose node has gone
    /// away is closed and the controller moves to `Disconnected`.
    pub async fn send_command(&self, channel: u8, opcode: Opcode) -> Result<()> {
        let frame = encode(self.check_channel(channel)?, opcode);

        let mut state = self.state.lock().await;
        let conn = self.live_connection(&mut state)?;
        let result = conn.send(&frame).await;
        self.settle_io(&mut state, result)
    }

    /// Query a channel and return the raw reply
    ///
    /// Fails with `ProtocolTimeout` when nothing arrived within the wait.
    pub async fn try_query_status(&self, channel: u8) -> Result<Vec<u8>> {
        let frame = encode(self.check_channel(channel)?, Opcode::Query);

        let mut state = self.state.lock().await;
        let conn = self.live_connection(&mut state)?;
        let result = exchange(conn, &frame, self.settings.query_wait).await;
        let bytes = self.settle_io(&mut state, result)?;

        if bytes.is_empty() {
            return Err(RelayError::ProtocolTimeout(format!(
                "{:?} (status query on channel {})",
                self.settings.query_wait, channel
            )));
        }
        Ok(bytes)
    }

    /// A board with the relay vendor id appeared
    ///
    /// Closes any current connection and runs discovery again. The caller is
    /// expected to have waited for the node to settle.
    pub async fn handle_device_added(&self) -> ConnectionStatus {
        let mut state = self.state.lock().await;
        self.rediscover_status(&mut state).await
    }

    /// A board with the relay vendor id went away
    ///
    /// Returns whether a connection was dropped.
    pub async fn handle_device_removed(&self) -> bool {
        let mut state = self.state.lock().await;
        if !matches!(*state, ConnectionState::Connected(_)) {
            debug!("Remove event while {}, nothing to drop", state.status());
            return false;
        }

        warn!("Relay board removed, closing connection");
        self.transition(&mut state, ConnectionState::Disconnected);
        true
    }

    /// Drop the current connection and discover again without waiting
    ///
    /// Fails with `DeviceNotFound` when discovery exhausts its retries, or
    /// with the open error when the board was found but could not be opened.
    pub async fn force_reconnect(&self) -> Result<DevicePath> {
        info!("Forced reconnect requested");
        let mut state = self.state.lock().await;
        self.rediscover(&mut state).await
    }

    /// Close the connection for good
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if matches!(*state, ConnectionState::Connected(_)) {
            info!("Closing relay board connection");
        }
        self.transition(&mut state, ConnectionState::Disconnected);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.borrow().status
    }

    pub fn device_path(&self) -> Option<DevicePath> {
        self.snapshot.borrow().device_path.clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    /// Time since the controller last left `Connected`
    pub fn time_since_disconnect(&self) -> Option<Duration> {
        self.snapshot
            .borrow()
            .last_disconnect
            .map(|at| at.elapsed())
    }

    pub fn max_channel(&self) -> u8 {
        self.settings.max_channel
    }

    pub fn scanner(&self) -> &PortScanner {
        &self.scanner
    }

    fn check_channel(&self, channel: u8) -> Result<Channel> {
        let invalid = RelayError::InvalidChannel {
            channel: channel.into(),
            max: self.settings.max_channel,
        };
        if channel > self.settings.max_channel {
            return Err(invalid);
        }
        Channel::new(channel).map_err(|_| invalid)
    }

    fn report(&self, channel: u8, result: Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Command on channel {} failed: {}", channel, e);
                false
            }
        }
    }

    /// The open connection, if it is still alive
    fn live_connection<'a>(
        &self,
        state: &'a mut ConnectionState,
    ) -> Result<&'a mut RelayConnection> {
        let lost = match state {
            ConnectionState::Connected(conn) => !conn.is_alive(),
            _ => false,
        };

        if lost {
            let path = state.device_path();
            warn!(
                "Relay board at {} is gone, closing connection",
                path.as_ref().map(|p| p.as_str()).unwrap_or("?")
            );
            self.transition(state, ConnectionState::Disconnected);
            return Err(RelayError::LostConnection(
                "Device node no longer present".to_string(),
            ));
        }

        match state {
            ConnectionState::Connected(conn) => Ok(conn),
            _ => Err(RelayError::NotOpen),
        }
    }

    /// Drop the connection when an I/O error says the board is gone
    fn settle_io<T>(&self, state: &mut ConnectionState, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if e.is_disconnect() => {
                warn!("Relay board lost during I/O: {}", e);
                self.transition(state, ConnectionState::Disconnected);
                Err(RelayError::LostConnection(e.to_string()))
            }
            other => other,
        }
    }

    /// Close any connection, discover, and install a fresh one
    async fn rediscover(&self, state: &mut ConnectionState) -> Result<DevicePath> {
        self.transition(state, ConnectionState::Searching);

        let opened = match self.scanner.discover().await {
            Some(path) => RelayConnection::open(self.backend.clone(), path, &self.settings),
            None => Err(RelayError::DeviceNotFound),
        };

        let conn = match opened {
            Ok(conn) => conn,
            Err(e) => {
                self.transition(state, ConnectionState::Disconnected);
                return Err(e);
            }
        };

        if self.ever_connected.swap(true, Ordering::Relaxed) {
            let count = self.reconnect_count.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Reconnected to relay board (reconnect #{})", count);
        }

        let path = conn.path().clone();
        self.transition(state, ConnectionState::Connected(conn));
        Ok(path)
    }

    async fn rediscover_status(&self, state: &mut ConnectionState) -> ConnectionStatus {
        if let Err(e) = self.rediscover(state).await {
            warn!("No relay board connected: {}", e);
        }
        state.status()
    }

    /// Replace the state, closing the old connection before the new state
    /// is installed, then publish the snapshot
    fn transition(&self, state: &mut ConnectionState, next: ConnectionState) {
        let was_connected = matches!(*state, ConnectionState::Connected(_));
        if let ConnectionState::Connected(conn) = state {
            conn.close();
        }
        *state = next;

        let status = state.status();
        let device_path = state.device_path();
        debug!("Connection state: {}", status);

        self.snapshot.send_modify(|snapshot| {
            if was_connected && status != ConnectionStatus::Connected {
                snapshot.last_disconnect = Some(Instant::now());
            }
            snapshot.status = status;
            snapshot.device_path = device_path;
        });
    }
}

/// Send a frame, wait, and collect whatever came back
async fn exchange(
    conn: &mut RelayConnection,
    frame: &CommandFrame,
    wait: Duration,
) -> Result<Vec<u8>> {
    conn.send(frame).await?;
    sleep(wait).await;
    conn.read_available().await
}
