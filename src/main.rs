//! Activity Timer - activity-aware timer coordination server
//!
//! This is the main entry point for the activity-timer application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use activity_timer::{
    api::create_router,
    config::Config,
    services::{ActivitySink, JsonFileStore, JsonLinesSink, MemoryStore, TimerStore, TracingSink},
    state::AppState,
    utils::{shutdown_signal, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("activity_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting activity-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, user={}, idle={}s, prompt={}s",
        config.host, config.port, config.user_id, config.idle_timeout_secs, config.prompt_timeout_secs
    );

    let store: Arc<dyn TimerStore> = match &config.state_dir {
        Some(dir) => {
            info!("Persisting timer state under {}", dir.display());
            Arc::new(JsonFileStore::open(dir)?)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let sink: Arc<dyn ActivitySink> = match &config.activity_log {
        Some(path) => {
            info!("Writing activity log to {}", path.display());
            Arc::new(JsonLinesSink::new(path))
        }
        None => Arc::new(TracingSink),
    };

    let state = AppState::start(
        config.engine_config(),
        store,
        sink,
        Arc::new(SystemClock),
        config.host.clone(),
        config.port,
    );

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /timers                  - Register a timer");
    info!("  GET    /timers[/:id]            - Timer readings");
    info!("  DELETE /timers/:id              - Unregister a timer");
    info!("  POST   /timers/:id/pause|resume - Pause or resume one timer");
    info!("  POST   /bulk/pause|resume       - Pause or resume every timer");
    info!("  POST   /users/:id/pause|resume  - Pause or resume a user's timers");
    info!("  POST   /presence                - Presence signal");
    info!("  POST   /visibility              - Tab visibility change");
    info!("  POST   /confirm                 - Still working");
    info!("  GET    /status                  - Idle phase and escalation status");
    info!("  GET    /health                  - Health check");

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

    state.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}
