//! Settings Persistence System
//!
//! Provides persistent service settings with:
//! - Atomic file writes (temp file + rename)
//! - Tolerant loading: missing or corrupt files fall back to defaults
//! - Environment overrides for secrets and deployment knobs
//!
//! Storage location: {config_dir}/truthgen/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::analysis::{
    ChatOracleConfig, RestStoreConfig, DEFAULT_TTL_HOURS, MEDIA_TEMPERATURE, RESULTS_DIR_NAME,
    SHARED_TABLE_NAME, TEXT_TEMPERATURE,
};
use crate::core::fs::atomic_write_json_pretty;
use crate::core::{CoreError, CoreResult};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Application directory name under the platform config/data dirs
pub const APP_DIR_NAME: &str = "truthgen";

pub const ENV_API_KEY: &str = "TRUTHGEN_ORACLE_API_KEY";
pub const ENV_LEGACY_API_KEY: &str = "LOVABLE_API_KEY";
pub const ENV_BASE_URL: &str = "TRUTHGEN_ORACLE_BASE_URL";
pub const ENV_MODEL: &str = "TRUTHGEN_ORACLE_MODEL";
pub const ENV_BIND_ADDR: &str = "TRUTHGEN_BIND_ADDR";
pub const ENV_SHARED_REST_KEY: &str = "TRUTHGEN_SHARED_REST_KEY";

const MAX_TTL_HOURS: u32 = 720;
const MIN_BODY_BYTES: usize = 1024;
const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// Default platform directory for persistent data
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default platform directory for the settings file
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

// =============================================================================
// App Settings
// =============================================================================

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Analysis oracle connection
    #[serde(default)]
    pub oracle: OracleSettings,

    /// Result cache tiers
    #[serde(default)]
    pub cache: CacheSettings,

    /// HTTP entry point
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            oracle: OracleSettings::default(),
            cache: CacheSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Corrects bad values instead of failing.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;
        self.oracle.normalize();
        self.cache.normalize();
        self.server.normalize();
    }

    /// Applies `TRUTHGEN_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary lookup; blank values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY).or_else(|| get(ENV_LEGACY_API_KEY)) {
            self.oracle.api_key = Some(key);
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.oracle.base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.oracle.model = model;
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
        if let Some(key) = get(ENV_SHARED_REST_KEY) {
            self.cache.shared.rest_key = Some(key);
        }
        self.normalize();
    }
}

fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if !value.is_finite() {
        return fallback;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

fn blank_to_none(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
        *value = None;
    }
}

// =============================================================================
// Oracle Settings
// =============================================================================

/// Analysis oracle settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OracleSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Gateway API key; prefer the environment over storing it here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Request timeout (unbounded when absent)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_text_temperature")]
    pub text_temperature: f32,

    #[serde(default = "default_media_temperature")]
    pub media_temperature: f32,
}

fn default_base_url() -> String {
    ChatOracleConfig::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    ChatOracleConfig::DEFAULT_MODEL.to_string()
}

fn default_text_temperature() -> f32 {
    TEXT_TEMPERATURE
}

fn default_media_temperature() -> f32 {
    MEDIA_TEMPERATURE
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            timeout_secs: None,
            text_temperature: default_text_temperature(),
            media_temperature: default_media_temperature(),
        }
    }
}

impl OracleSettings {
    fn normalize(&mut self) {
        if self.base_url.trim().is_empty() {
            self.base_url = default_base_url();
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        blank_to_none(&mut self.api_key);
        if self.timeout_secs == Some(0) {
            self.timeout_secs = None;
        }
        self.text_temperature =
            clamp_f32(self.text_temperature, 0.0, 2.0, default_text_temperature());
        self.media_temperature =
            clamp_f32(self.media_temperature, 0.0, 2.0, default_media_temperature());
    }

    /// Builds the oracle client config; fails without an API key
    pub fn client_config(&self) -> CoreResult<ChatOracleConfig> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CoreError::ConfigError(format!("API key not configured (set {})", ENV_API_KEY))
        })?;

        let mut config = ChatOracleConfig::new(api_key)
            .with_base_url(&self.base_url)
            .with_model(&self.model);
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(secs);
        }
        Ok(config)
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Shared tier backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedBackend {
    Sqlite,
    Rest,
    Disabled,
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    /// Local results directory (defaults under the data dir)
    #[serde(default)]
    pub local_dir: Option<PathBuf>,

    /// Age after which local entries are evicted
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,

    #[serde(default)]
    pub shared: SharedCacheSettings,
}

fn default_ttl_hours() -> u32 {
    DEFAULT_TTL_HOURS
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            local_dir: None,
            ttl_hours: default_ttl_hours(),
            shared: SharedCacheSettings::default(),
        }
    }
}

impl CacheSettings {
    fn normalize(&mut self) {
        self.ttl_hours = self.ttl_hours.clamp(1, MAX_TTL_HOURS);
        self.shared.normalize();
    }

    /// Local results directory
    pub fn resolved_local_dir(&self) -> PathBuf {
        self.local_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join(RESULTS_DIR_NAME))
    }
}

/// Shared tier settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedCacheSettings {
    /// "sqlite" | "rest" | "none"
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,

    #[serde(default)]
    pub rest_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_key: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

fn default_table() -> String {
    SHARED_TABLE_NAME.to_string()
}

impl Default for SharedCacheSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: None,
            rest_url: None,
            rest_key: None,
            table: default_table(),
        }
    }
}

impl SharedCacheSettings {
    fn normalize(&mut self) {
        self.backend = normalize_enum(&self.backend, &["sqlite", "rest", "none"], default_backend());
        blank_to_none(&mut self.rest_url);
        blank_to_none(&mut self.rest_key);
        let table_ok = !self.table.is_empty()
            && self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !table_ok {
            self.table = default_table();
        }
    }

    pub fn backend_kind(&self) -> SharedBackend {
        match self.backend.as_str() {
            "rest" => SharedBackend::Rest,
            "none" => SharedBackend::Disabled,
            _ => SharedBackend::Sqlite,
        }
    }

    /// Shared SQLite database path
    pub fn resolved_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("shared-cache.db"))
    }

    /// REST store config; fails when no URL is set
    pub fn rest_config(&self, timeout_secs: Option<u64>) -> CoreResult<RestStoreConfig> {
        let url = self.rest_url.as_deref().ok_or_else(|| {
            CoreError::ConfigError("Shared cache backend 'rest' needs restUrl".to_string())
        })?;
        let mut config = RestStoreConfig::new(url, &self.table);
        if let Some(key) = &self.rest_key {
            config = config.with_api_key(key);
        }
        if let Some(secs) = timeout_secs {
            config = config.with_timeout(secs);
        }
        Ok(config)
    }
}

// =============================================================================
// Server Settings
// =============================================================================

/// HTTP entry point settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Log directory (defaults under the data dir)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_max_body_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_dir: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerSettings {
    fn normalize(&mut self) {
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            self.bind_addr = default_bind_addr();
        }
        self.max_body_bytes = self.max_body_bytes.clamp(MIN_BODY_BYTES, MAX_BODY_BYTES);
    }

    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| default_data_dir().join("logs"))
    }
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager for the given config directory
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CoreError::ConfigError(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| CoreError::ConfigError(format!("Failed to open settings lock file: {}", e)))?;

        let locked = if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)
        } else {
            fs2::FileExt::lock_shared(&lock_file)
        };
        locked.map_err(|e| CoreError::ConfigError(format!("Failed to lock settings file: {}", e)))?;

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<AppSettings>(&content)?;
            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Loads settings and applies environment overrides
    pub fn load_with_env(&self) -> AppSettings {
        let mut settings = self.load();
        settings.apply_env_overrides();
        settings
    }

    /// Save settings to disk using atomic write (temp file + rename)
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            atomic_write_json_pretty(&self.settings_path, &normalized)?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, SettingsManager) {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        (temp_dir, manager)
    }

    // ------------------------------------------------------------------
    // Defaults & Normalization
    // ------------------------------------------------------------------

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();

        assert_eq!(settings.oracle.base_url, "https://ai.gateway.lovable.dev/v1");
        assert_eq!(settings.oracle.model, "google/gemini-2.5-pro");
        assert!(settings.oracle.api_key.is_none());
        assert!(settings.oracle.timeout_secs.is_none());
        assert!((settings.oracle.text_temperature - 0.3).abs() < 0.001);
        assert!((settings.oracle.media_temperature - 0.2).abs() < 0.001);

        assert_eq!(settings.cache.ttl_hours, 24);
        assert_eq!(settings.cache.shared.backend_kind(), SharedBackend::Sqlite);
        assert_eq!(settings.cache.shared.table, "analysis_cache");

        assert_eq!(settings.server.bind_addr, "127.0.0.1:8787");
        assert_eq!(settings.server.max_body_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn test_normalization_clamps_and_repairs() {
        let mut settings = AppSettings::default();
        settings.cache.ttl_hours = 0;
        settings.cache.shared.backend = "Redis".to_string();
        settings.cache.shared.table = "drop table;".to_string();
        settings.oracle.text_temperature = f32::NAN;
        settings.oracle.media_temperature = 9.0;
        settings.oracle.timeout_secs = Some(0);
        settings.oracle.api_key = Some("  ".to_string());
        settings.server.bind_addr = "not an address".to_string();
        settings.server.max_body_bytes = 1;

        settings.normalize();

        assert_eq!(settings.cache.ttl_hours, 1);
        assert_eq!(settings.cache.shared.backend, "sqlite");
        assert_eq!(settings.cache.shared.table, "analysis_cache");
        assert!((settings.oracle.text_temperature - 0.3).abs() < 0.001);
        assert!((settings.oracle.media_temperature - 2.0).abs() < 0.001);
        assert!(settings.oracle.timeout_secs.is_none());
        assert!(settings.oracle.api_key.is_none());
        assert_eq!(settings.server.bind_addr, "127.0.0.1:8787");
        assert_eq!(settings.server.max_body_bytes, MIN_BODY_BYTES);
    }

    #[test]
    fn test_backend_kinds() {
        let mut shared = SharedCacheSettings {
            backend: "REST".to_string(),
            ..SharedCacheSettings::default()
        };
        shared.normalize();
        assert_eq!(shared.backend_kind(), SharedBackend::Rest);

        shared.backend = "none".to_string();
        assert_eq!(shared.backend_kind(), SharedBackend::Disabled);
    }

    // ------------------------------------------------------------------
    // Derived Configs
    // ------------------------------------------------------------------

    #[test]
    fn test_oracle_config_requires_key() {
        let settings = AppSettings::default();
        let err = settings.oracle.client_config().unwrap_err();
        assert!(matches!(err, CoreError::ConfigError(_)));
    }

    #[test]
    fn test_oracle_config_from_settings() {
        let mut settings = AppSettings::default();
        settings.oracle.api_key = Some("secret".to_string());
        settings.oracle.timeout_secs = Some(30);

        let config = settings.oracle.client_config().unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_rest_config_requires_url() {
        let shared = SharedCacheSettings::default();
        assert!(shared.rest_config(None).is_err());

        let shared = SharedCacheSettings {
            rest_url: Some("https://db.example.com/rest/v1".to_string()),
            rest_key: Some("k".to_string()),
            ..SharedCacheSettings::default()
        };
        let config = shared.rest_config(Some(5)).unwrap();
        assert_eq!(config.table_url(), "https://db.example.com/rest/v1/analysis_cache");
        assert_eq!(config.api_key.as_deref(), Some("k"));
    }

    // ------------------------------------------------------------------
    // Environment Overrides
    // ------------------------------------------------------------------

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "from-env"),
            (ENV_MODEL, "google/gemini-2.5-flash"),
            (ENV_BIND_ADDR, "0.0.0.0:9000"),
            (ENV_SHARED_REST_KEY, "rest-key"),
        ]
        .into_iter()
        .collect();

        let mut settings = AppSettings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.oracle.api_key.as_deref(), Some("from-env"));
        assert_eq!(settings.oracle.model, "google/gemini-2.5-flash");
        assert_eq!(settings.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(settings.cache.shared.rest_key.as_deref(), Some("rest-key"));
    }

    #[test]
    fn test_legacy_key_and_blank_values() {
        let env: HashMap<&str, &str> = [(ENV_API_KEY, " "), (ENV_LEGACY_API_KEY, "legacy")]
            .into_iter()
            .collect();

        let mut settings = AppSettings::default();
        settings.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.oracle.api_key.as_deref(), Some("legacy"));
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let (_temp_dir, manager) = create_test_manager();
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let (_temp_dir, manager) = create_test_manager();
        let mut settings = AppSettings::default();
        settings.cache.ttl_hours = 48;
        settings.cache.shared.backend = "none".to_string();

        manager.save(&settings).unwrap();
        let loaded = manager.load();

        assert_eq!(loaded.cache.ttl_hours, 48);
        assert_eq!(loaded.cache.shared.backend_kind(), SharedBackend::Disabled);
    }

    #[test]
    fn test_save_normalizes() {
        let (_temp_dir, manager) = create_test_manager();
        let mut settings = AppSettings::default();
        settings.cache.ttl_hours = 10_000;

        let saved = manager.save(&settings).unwrap();
        assert_eq!(saved.cache.ttl_hours, MAX_TTL_HOURS);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let (_temp_dir, manager) = create_test_manager();
        fs::write(manager.settings_path(), r#"{"cache": {"ttlHours": 12}}"#).unwrap();

        let loaded = manager.load();
        assert_eq!(loaded.cache.ttl_hours, 12);
        assert_eq!(loaded.oracle, OracleSettings::default());
    }

    #[test]
    fn test_corrupt_file_returns_defaults() {
        let (_temp_dir, manager) = create_test_manager();
        fs::write(manager.settings_path(), "{ not json").unwrap();

        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_reset_deletes_file() {
        let (_temp_dir, manager) = create_test_manager();
        manager.save(&AppSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        manager.reset().unwrap();
        assert!(!manager.settings_path().exists());
    }
}
