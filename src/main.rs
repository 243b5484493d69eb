//! Redose - neuromuscular blocker re-dosing timers
//!
//! This is the main entry point for the redose controller.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use redose::{
    api::create_router,
    config::Config,
    services::{
        AlertEngine, AlertSink, FileStore, KeyValueStore, LogAlert, MemoryStore, TerminalBell,
        TriggerChannel, WakeLock,
    },
    state::{AppState, Services},
    tasks::{tick_task, wake_lock_task, WAKE_LOCK_RETRY},
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("redose={},tower_http=info", config.log_level()))
        .init();

    info!("Starting redose v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={}, tick={}ms, alert every {}s",
        config.host,
        config.port,
        config.data_dir.display(),
        config.tick_interval().as_millis(),
        config.alert_interval().as_secs()
    );

    // Storage failures must not stop the timers; fall back to memory
    let store: Arc<dyn KeyValueStore> = match FileStore::open(&config.data_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Persistent storage unavailable ({}), timers will not survive restart", e);
            Arc::new(MemoryStore::new())
        }
    };

    let mut sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlert)];
    if !config.no_bell {
        sinks.push(Arc::new(TerminalBell));
    }

    let services = Services {
        clock: Arc::new(SystemClock),
        store,
        alerts: AlertEngine::new(sinks, config.alert_interval()),
        trigger: TriggerChannel::new(),
        wake_lock: if config.no_wake_lock {
            WakeLock::disabled()
        } else {
            WakeLock::new()
        },
    };

    // Create application state and subscribe it to give events
    let state = Arc::new(AppState::new(services, config.host.clone(), config.port));
    let subscription = state.attach_trigger();

    // Start background tasks
    let tick = tokio::spawn(tick_task(Arc::clone(&state), config.tick_interval()));
    let keeper = tokio::spawn(wake_lock_task(Arc::clone(&state), WAKE_LOCK_RETRY));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /give/:agent          - Dose given, start/restart timer");
    info!("  GET    /timers               - Timers and remaining time");
    info!("  POST   /timers               - Start a bolus timer");
    info!("  POST   /timers/:id/top-up    - Top up now & restart");
    info!("  POST   /timers/:id/nudge     - Adjust target by minutes");
    info!("  POST   /timers/:id/silence   - Silence due alert");
    info!("  POST   /timers/:id/pause     - Pause timer");
    info!("  POST   /timers/:id/resume    - Resume timer");
    info!("  DELETE /timers/:id           - Remove timer");
    info!("  GET    /agents               - Agent catalog");
    info!("  GET    /agents/:agent/dose   - Maintenance dose suggestion");
    info!("  PUT    /patient              - Store patient record");
    info!("  GET    /health               - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    tick.abort();
    keeper.abort();
    drop(subscription);
    state.shutdown();

    info!("Server shutdown complete");
    Ok(())
}
