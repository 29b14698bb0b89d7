//! relay-hardware
//!
//! Hardware crate for CH34x relay boards: the serial transport, device
//! discovery, the connection lifecycle, and hotplug recovery. The daemon talks
//! to the board only through `RelayController`.
//!
//! Public API:
//! - `relay_controller::RelayController`: façade over connection and recovery
//! - `port_scanner::PortScanner`: finds and probes candidate device nodes
//! - `connection::RelayConnection`: one open handle with send spacing
//! - `hotplug::HotplugMonitor`: consumes add/remove events
//! - `serial_driver::{SystemBackend, SerialDriver}`: `/dev` and `tokio-serial`
//! - `mock::MockBackend`: simulated board for tests and `--mock`

pub mod connection;
pub mod hotplug;
pub mod mock;
pub mod port_scanner;
pub mod relay_controller;
pub mod serial_driver;
pub mod settings;

pub use connection::RelayConnection;
pub use hotplug::{HotplugAction, HotplugEvent, HotplugMonitor};
pub use mock::MockBackend;
pub use port_scanner::PortScanner;
pub use relay_controller::{ConnectionState, RelayController, StatusSnapshot};
pub use serial_driver::{DeviceBackend, RelayTransport, SerialDriver, SystemBackend};
pub use settings::{DriverSettings, RetryPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_present() {
        let _ = std::any::TypeId::of::<RelayController>();
        let _ = std::any::TypeId::of::<SerialDriver>();
        let _ = std::any::TypeId::of::<MockBackend>();
    }
}
