//! API module for the relay daemon
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use relay_core::config::GateConfig;
use relay_core::BoardInfo;
use relay_hardware::RelayController;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    /// Runtime board information
    pub board_info: Arc<BoardInfo>,
    /// The one relay controller
    pub controller: Arc<RelayController>,
    /// Channels and pulse length of the gate endpoints
    pub gate: GateConfig,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(board_info: BoardInfo, controller: Arc<RelayController>, gate: GateConfig) -> Self {
        Self {
            board_info: Arc::new(board_info),
            controller,
            gate,
            start_time: Instant::now(),
        }
    }
}

/// Create the main API router with all endpoints
pub(crate) fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    Router::new()
        // Gate endpoints
        .route("/gate-open", get(handlers::gate::gate_open))
        .route("/gate-close", get(handlers::gate::gate_close))
        // Relay channel endpoints
        .route(
            "/api/v0/relay/:channel/on",
            get(handlers::relay::switch_on),
        )
        .route(
            "/api/v0/relay/:channel/off",
            get(handlers::relay::switch_off),
        )
        .route(
            "/api/v0/relay/:channel/toggle",
            get(handlers::relay::toggle),
        )
        .route(
            "/api/v0/relay/:channel/status",
            get(handlers::relay::status),
        )
        // Device endpoints
        .route(
            "/api/v0/device/reconnect",
            post(handlers::relay::reconnect),
        )
        // System info endpoints
        .route("/api/v0/info", get(handlers::info::get_info))
        .route("/version", get(handlers::info::version))
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub(crate) mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use relay_core::api::ApiResponse;
    use relay_core::RelayError;

    use tracing::error;

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }

        /// Create a service unavailable error (for hardware issues)
        pub fn service_unavailable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            error!("API Error {}: {}", self.status_code, self.message);

            let response: ApiResponse<()> = ApiResponse::error(self.message);

            (self.status_code, Json(response)).into_response()
        }
    }

    /// Convert RelayError to ApiError
    impl From<RelayError> for ApiError {
        fn from(err: RelayError) -> Self {
            match err {
                RelayError::InvalidChannel { .. } => Self::bad_request(err.to_string()),
                RelayError::DeviceNotFound | RelayError::NotOpen => {
                    Self::service_unavailable("Relay board not available")
                }
                RelayError::Open { .. }
                | RelayError::LostConnection(_)
                | RelayError::ProtocolTimeout(_)
                | RelayError::Serial(_) => Self::service_unavailable(err.to_string()),
                _ => Self::internal_error(err.to_string()),
            }
        }
    }
}

/// Helper macro for success responses
#[macro_export]
macro_rules! api_ok {
    ($data:expr) => {
        Ok(axum::Json(relay_core::api::ApiResponse::success($data)))
    };
}
