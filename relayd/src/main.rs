//! Relay Gate Server
//!
//! REST API server for a CH34x USB relay board.
//!
//! The board is found by scanning `/dev` for CH34x serial nodes, and is
//! followed across unplug/replug through udev events (or periodic polling
//! when udev is unavailable). Relay commands sent while no board is present
//! fail fast instead of blocking.

mod api;
mod config;
mod hotplug;
mod shutdown;

use anyhow::Result;
use api::AppState;
use clap::Parser;
use relay_core::{resolve_config_path, BoardInfo, DefaultBoard, CONFIG_ENV_VAR};
use relay_hardware::{DeviceBackend, DriverSettings, MockBackend, RelayController, SystemBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

/// Node served by the simulated board in mock mode
const MOCK_DEVICE: &str = "/dev/ttyUSB0";

/// Relay Gate API Server
#[derive(Parser, Debug)]
#[command(name = "relayd")]
#[command(version, about = "CH34x Relay Board API Server", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server bind address (defaults to server.hostname from the config)
    #[arg(short, long)]
    bind: Option<String>,

    /// Server port
    #[arg(short, long)]
    port: Option<u16>,

    /// Serial device path (e.g., /dev/ttyUSB0)
    ///
    /// Skips discovery and only ever uses this node.
    #[arg(long)]
    device: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable mock mode (simulated board, no hardware needed)
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    init_tracing(args.verbose);

    info!("Relay Gate Server starting...");

    // Determine config path: CLI flag > env var > default
    let config_path = resolve_config_path(args.config, std::env::var_os(CONFIG_ENV_VAR));
    info!("Configuration file: {}", config_path.display());

    // Step 1: Load configuration, CLI flags win
    let mut static_config = config::load_static_config(&config_path).await?;
    if let Some(device) = args.device {
        static_config.device.path = Some(device);
    }
    if let Some(port) = args.port {
        static_config.server.port = port;
    }
    static_config.validate()?;
    info!("Configuration loaded successfully");

    let bind_addr = format!(
        "{}:{}",
        args.bind.as_deref().unwrap_or(&static_config.server.hostname),
        static_config.server.port
    );

    // Step 2: Find the board
    let backend: Arc<dyn DeviceBackend> = if args.mock {
        info!("Mock mode: simulated board at {}", MOCK_DEVICE);
        Arc::new(MockBackend::simulated_board(MOCK_DEVICE))
    } else {
        Arc::new(SystemBackend::default())
    };

    let settings = DriverSettings::from_config(&static_config);
    let controller = Arc::new(RelayController::new(backend, settings));

    let tracker = TaskTracker::new();
    let cancel = CancellationToken::new();

    // Step 3: Follow the board across unplug/replug. Started before discovery
    // so a board plugged in meanwhile is not missed.
    let source = hotplug::start_monitor(
        &static_config.hotplug,
        controller.clone(),
        args.mock,
        &tracker,
        cancel.clone(),
    )
    .await?;
    info!("Hotplug event source: {:?}", source);

    // Startup discovery runs in the background; the API answers meanwhile
    tracker.spawn(hotplug::startup_discovery(controller.clone(), cancel.clone()));

    // Step 4: Create application state
    let board_info = BoardInfo::for_board::<DefaultBoard>(controller.max_channel());
    let app_state = AppState::new(board_info, controller.clone(), static_config.gate.clone());

    // Set up API router
    let app = api::create_router(app_state);

    // Start server
    info!("Starting server on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Relay Gate API Server listening on {}", bind_addr);
    info!("Server ready!");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the monitor before touching the board one last time
    cancel.cancel();
    tracker.close();
    tracker.wait().await;

    shutdown::release_relays(&static_config.shutdown, &controller).await;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
