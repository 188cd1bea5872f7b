//! TruthGen Service Library
//!
//! Content credibility analysis behind a two-tier result cache.
//! The `truthgen` binary serves it over HTTP; `truthgen-cli` calls it directly.

pub mod api;
pub mod core;

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::core::analysis::{
    AnalysisDispatcher, AnalysisOracle, AnalysisOrchestrator, ChatCompletionsOracle,
    DisabledStore, LocalResultStore, RestResultStore, ResultStore, SqliteResultStore,
};
use crate::core::settings::{AppSettings, SharedBackend};
use crate::core::CoreResult;

// =============================================================================
// Application State
// =============================================================================

/// Process-wide state owned by the entry point and shared with handlers
pub struct AppState {
    pub orchestrator: AnalysisOrchestrator,
    /// Local tier handle, kept for maintenance (eviction, stats)
    pub local_store: Arc<LocalResultStore>,
    /// Shared tier backend name, for health reporting
    pub shared_backend: String,
    /// Oracle model name, for health reporting
    pub model: String,
}

impl AppState {
    /// Builds the state from settings with the configured HTTP oracle.
    ///
    /// Fails when no oracle API key is configured.
    pub fn from_settings(settings: &AppSettings) -> CoreResult<Self> {
        let oracle = ChatCompletionsOracle::new(settings.oracle.client_config()?)?;
        Self::with_oracle(settings, Arc::new(oracle))
    }

    /// Builds the state around an explicit oracle
    pub fn with_oracle(
        settings: &AppSettings,
        oracle: Arc<dyn AnalysisOracle>,
    ) -> CoreResult<Self> {
        let local_store = Arc::new(open_local_store(settings));
        let shared_store = open_shared_store(settings)?;

        let dispatcher = AnalysisDispatcher::new(oracle).with_temperatures(
            settings.oracle.text_temperature,
            settings.oracle.media_temperature,
        );
        let orchestrator =
            AnalysisOrchestrator::new(local_store.clone(), shared_store.clone(), dispatcher);

        info!(
            "Result caches ready: local at {}, shared via {}",
            local_store.cache_dir().display(),
            shared_store.name()
        );

        Ok(Self {
            orchestrator,
            local_store,
            shared_backend: shared_store.name().to_string(),
            model: settings.oracle.model.clone(),
        })
    }
}

/// Opens the local tier described by settings
pub fn open_local_store(settings: &AppSettings) -> LocalResultStore {
    LocalResultStore::from_dir(settings.cache.resolved_local_dir())
        .with_ttl_hours(settings.cache.ttl_hours)
}

/// Opens the shared tier described by settings
pub fn open_shared_store(settings: &AppSettings) -> CoreResult<Arc<dyn ResultStore>> {
    let shared = &settings.cache.shared;
    let store: Arc<dyn ResultStore> = match shared.backend_kind() {
        SharedBackend::Sqlite => Arc::new(SqliteResultStore::open(shared.resolved_sqlite_path())?),
        SharedBackend::Rest => Arc::new(RestResultStore::new(
            shared.rest_config(settings.oracle.timeout_secs)?,
        )?),
        SharedBackend::Disabled => Arc::new(DisabledStore),
    };
    Ok(store)
}

// =============================================================================
// Logging
// =============================================================================

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes stdout and daily-rolling file logging.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(log_dir: &Path) {
    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::daily(log_dir, "truthgen.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    if LOG_GUARD.set(guard).is_err() {
        return;
    }

    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::ScriptedOracle;
    use tempfile::TempDir;

    fn create_test_settings(backend: &str) -> (TempDir, AppSettings) {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = AppSettings::default();
        settings.cache.local_dir = Some(temp_dir.path().join("results"));
        settings.cache.shared.sqlite_path = Some(temp_dir.path().join("shared.db"));
        settings.cache.shared.backend = backend.to_string();
        (temp_dir, settings)
    }

    #[test]
    fn test_state_requires_api_key() {
        let (_temp_dir, settings) = create_test_settings("none");
        assert!(AppState::from_settings(&settings).is_err());
    }

    #[test]
    fn test_state_with_sqlite_backend() {
        let (temp_dir, settings) = create_test_settings("sqlite");
        let state = AppState::with_oracle(&settings, Arc::new(ScriptedOracle::replying("{}")))
            .unwrap();

        assert_eq!(state.shared_backend, "sqlite");
        assert_eq!(state.local_store.cache_dir(), temp_dir.path().join("results"));
        assert!(temp_dir.path().join("shared.db").exists());
    }

    #[test]
    fn test_state_with_disabled_backend() {
        let (_temp_dir, settings) = create_test_settings("none");
        let state = AppState::with_oracle(&settings, Arc::new(ScriptedOracle::replying("{}")))
            .unwrap();
        assert_eq!(state.shared_backend, "disabled");
    }

    #[test]
    fn test_rest_backend_requires_url() {
        let (_temp_dir, settings) = create_test_settings("rest");
        assert!(open_shared_store(&settings).is_err());
    }
}
