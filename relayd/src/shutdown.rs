//! Shutdown handling for graceful daemon termination
//!
//! Switches off the configured channels and releases the serial handle, so
//! the board is left in a known state when the daemon terminates.

use relay_core::config::ShutdownConfig;
use relay_hardware::RelayController;
use tracing::{info, warn};

/// Switch off the configured channels, then close the connection
///
/// Failures are logged; shutdown always runs to completion.
pub(crate) async fn release_relays(config: &ShutdownConfig, controller: &RelayController) {
    if config.switch_off_channels.is_empty() {
        info!("No channels configured to switch off at shutdown");
    }

    for &channel in &config.switch_off_channels {
        if controller.close_channel(channel, false).await {
            info!("Channel {} switched off", channel);
        } else {
            warn!("Failed to switch off channel {} during shutdown", channel);
        }
    }

    controller.shutdown().await;
    info!("Relay board released");
}
