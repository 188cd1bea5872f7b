//! TruthGen HTTP service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use truthgen_lib::core::settings::{default_config_dir, SettingsManager};
use truthgen_lib::core::CoreResult;
use truthgen_lib::{api, init_logging, AppState};

#[tokio::main]
async fn main() -> CoreResult<()> {
    let settings = SettingsManager::new(default_config_dir()).load_with_env();
    init_logging(&settings.server.resolved_log_dir());

    info!("Starting TruthGen v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_settings(&settings)?;

    match state.local_store.evict_expired() {
        Ok(0) => {}
        Ok(removed) => info!("Evicted {} expired local results", removed),
        Err(e) => warn!("Startup eviction failed: {}", e),
    }

    let router = api::router(Arc::new(state), settings.server.max_body_bytes);
    let listener = TcpListener::bind(&settings.server.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
