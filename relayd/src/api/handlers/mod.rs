//! API request handlers for the relay daemon REST API.
//!
//! This module organizes all HTTP endpoint handlers into logical groups:
//!
//! # Handler Modules
//!
//! - [`info`] - Service banner, version, and device information
//! - [`gate`] - Legacy gate endpoints that pulse a relay channel
//! - [`relay`] - Per-channel switching, status queries, and forced reconnect
//!
//! # API Structure
//!
//! The `/api/v0` handlers follow a consistent pattern:
//! - Accept `State<AppState>` for accessing shared application state
//! - Return `Result<Json<ApiResponse<T>>, ApiError>` for uniform responses
//! - Use the `api_ok!()` macro for success responses
//! - Log operations using the `tracing` crate
//!
//! The gate endpoints use the legacy `{"code", "msg"}` body and
//! always answer HTTP 200.

pub mod gate;
pub mod info;
pub mod relay;
