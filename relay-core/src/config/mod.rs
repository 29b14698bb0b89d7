//! Configuration types for the relay daemon
//!
//! All settings live in a single TOML file ([`StaticConfig`]) read once at
//! startup. Relay state itself is never persisted.

mod paths;
mod static_config;

pub use paths::{default_config_path, resolve_config_path, CONFIG_ENV_VAR};
pub use static_config::{
    DeviceConfig, DiscoveryConfig, GateConfig, HotplugConfig, ServerConfig, ShutdownConfig,
    StaticConfig,
};
