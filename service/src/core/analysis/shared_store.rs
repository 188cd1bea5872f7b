//! Shared Result Store (SQLite)
//!
//! Centrally reachable result cache backed by SQLite. Rows are keyed by
//! fingerprint and hold the result as a JSON blob. The shared tier never
//! expires entries.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::core::{now_millis, ContentFingerprint, CoreError, CoreResult};

use super::{AnalysisResult, ResultStore};

/// Default table for shared results
pub const SHARED_TABLE_NAME: &str = "analysis_cache";

// =============================================================================
// SQLite Result Store
// =============================================================================

/// SQLite-backed shared result cache
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Opens (or creates) the database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            CoreError::CacheUnavailable(format!(
                "Failed to open shared cache {}: {}",
                path.display(),
                e
            ))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::CacheUnavailable(format!("Failed to create in-memory database: {}", e))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initializes the database schema
    fn init_schema(&self) -> CoreResult<()> {
        self.connection()?
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS analysis_cache (
                    hash TEXT PRIMARY KEY,
                    result TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                "#,
            )
            .map_err(|e| CoreError::CacheUnavailable(format!("Failed to initialize schema: {}", e)))
    }

    fn connection(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::CacheUnavailable("Shared cache connection poisoned".to_string()))
    }

    /// Looks up a result by fingerprint
    pub fn load(&self, fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        let raw: Option<String> = self
            .connection()?
            .query_row(
                "SELECT result FROM analysis_cache WHERE hash = ?1",
                params![fingerprint.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::CacheUnavailable(format!("Shared cache lookup failed: {}", e)))?;

        match raw {
            Some(raw) => {
                let result = serde_json::from_str(&raw).map_err(|e| {
                    CoreError::CacheUnavailable(format!(
                        "Shared cache row {} is unreadable: {}",
                        fingerprint.short(),
                        e
                    ))
                })?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    /// Inserts or replaces the result for a fingerprint
    pub fn save(&self, fingerprint: &ContentFingerprint, result: &AnalysisResult) -> CoreResult<()> {
        let raw = serde_json::to_string(result)?;

        self.connection()?
            .execute(
                r#"
                INSERT INTO analysis_cache (hash, result, created_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(hash) DO UPDATE SET
                    result = excluded.result,
                    created_at = excluded.created_at
                "#,
                params![fingerprint.as_str(), raw, now_millis()],
            )
            .map_err(|e| CoreError::PersistenceFailure(format!("Shared cache write failed: {}", e)))?;

        debug!("Stored result {} in shared cache", fingerprint.short());
        Ok(())
    }

    /// Number of stored rows
    pub fn count(&self) -> CoreResult<usize> {
        let count: i64 = self
            .connection()?
            .query_row("SELECT COUNT(*) FROM analysis_cache", [], |row| row.get(0))
            .map_err(|e| CoreError::CacheUnavailable(format!("Failed to count rows: {}", e)))?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get(&self, fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        self.load(fingerprint)
    }

    async fn put(
        &self,
        fingerprint: &ContentFingerprint,
        result: &AnalysisResult,
    ) -> CoreResult<()> {
        self.save(fingerprint, result)
    }
}

// =============================================================================
// Tests
// =============================================================================
