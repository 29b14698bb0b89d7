//! Relay Core Library
//!
//! Shared types, protocol codec, and configuration for the CH34x relay
//! driver. This crate has no I/O; the serial and hotplug code lives in
//! `relay-hardware`.

pub mod api;
pub mod board;
pub mod config;
pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types
pub use board::*;
pub use config::{default_config_path, resolve_config_path, StaticConfig, CONFIG_ENV_VAR};
pub use error::*;
pub use protocol::{encode, CommandFrame, Opcode};
pub use types::*;
