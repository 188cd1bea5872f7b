//! Local Result Store
//!
//! Device-local, durable result cache with time-based eviction.
//! Storage: `{cache_dir}/{fingerprint}.json`, one record per fingerprint
//! laid out as `{hash, ...result, timestamp}`.

use async_trait::async_trait;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::fs::{atomic_write_json_pretty, is_scratch_file};
use crate::core::{now_millis, ContentFingerprint, CoreError, CoreResult, EpochMillis};

use super::{AnalysisResult, CacheEntry, ResultStore};

// =============================================================================
// Constants
// =============================================================================

/// Directory name for cached results within the data directory
pub const RESULTS_DIR_NAME: &str = "analysis-results";

/// Default time-to-live for local entries
pub const DEFAULT_TTL_HOURS: u32 = 24;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

// =============================================================================
// Local Result Store
// =============================================================================

/// Summary of the local cache contents
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalStoreStats {
    pub entries: usize,
    pub unreadable: usize,
    pub oldest: Option<EpochMillis>,
    pub newest: Option<EpochMillis>,
}

/// File-per-fingerprint result cache
pub struct LocalResultStore {
    /// Directory holding one JSON record per fingerprint
    cache_dir: PathBuf,
    /// Entries older than this are removed by the eviction sweep
    ttl_millis: i64,
}

impl LocalResultStore {
    /// Creates a store under `{data_dir}/analysis-results`
    pub fn new(data_dir: &Path) -> Self {
        Self::from_dir(data_dir.join(RESULTS_DIR_NAME))
    }

    /// Creates the store from an existing cache directory
    pub fn from_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            ttl_millis: i64::from(DEFAULT_TTL_HOURS) * MILLIS_PER_HOUR,
        }
    }

    /// Overrides the eviction age
    pub fn with_ttl_hours(mut self, hours: u32) -> Self {
        self.ttl_millis = i64::from(hours.max(1)) * MILLIS_PER_HOUR;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl_millis(&self) -> i64 {
        self.ttl_millis
    }

    /// Returns the file path for a fingerprint's record
    pub fn entry_path(&self, fingerprint: &ContentFingerprint) -> PathBuf {
        self.cache_dir.join(format!("{}.json", fingerprint))
    }

    /// Loads a record. Any storage failure is reported as a miss.
    pub fn load(&self, fingerprint: &ContentFingerprint) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cached result {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&content) {
            Ok(entry) if entry.fingerprint == *fingerprint => Some(entry),
            Ok(entry) => {
                warn!(
                    "Cached result {} belongs to {}, ignoring",
                    path.display(),
                    entry.fingerprint.short()
                );
                None
            }
            Err(e) => {
                warn!("Failed to parse cached result {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Stores a result stamped with the current time
    pub fn save(&self, fingerprint: &ContentFingerprint, result: &AnalysisResult) -> CoreResult<()> {
        self.save_at(fingerprint, result, now_millis())
    }

    /// Stores a result with an explicit timestamp
    pub fn save_at(
        &self,
        fingerprint: &ContentFingerprint,
        result: &AnalysisResult,
        stored_at: EpochMillis,
    ) -> CoreResult<()> {
        let entry = CacheEntry::new(fingerprint.clone(), result.clone(), stored_at);
        let path = self.entry_path(fingerprint);

        atomic_write_json_pretty(&path, &entry).map_err(|e| {
            CoreError::PersistenceFailure(format!(
                "Failed to write cached result {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!("Cached result {} locally", fingerprint.short());
        Ok(())
    }

    /// Deletes every entry older than the TTL
    pub fn evict_expired(&self) -> CoreResult<usize> {
        self.evict_expired_at(now_millis())
    }

    /// Deletes every entry older than the TTL relative to `now`.
    ///
    /// Safe to run concurrently with itself and with writers: entries that
    /// vanish mid-sweep are skipped. Unreadable records are removed too,
    /// since they can never produce a hit.
    pub fn evict_expired_at(&self, now: EpochMillis) -> CoreResult<usize> {
        let mut removed = 0;

        for path in self.record_paths()? {
            let expired = match fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<CacheEntry>(&content) {
                    Ok(entry) => entry.is_expired(now, self.ttl_millis),
                    Err(e) => {
                        warn!("Evicting unreadable cache record {}: {}", path.display(), e);
                        true
                    }
                },
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => {
                    warn!("Failed to read cache record {}: {}", path.display(), e);
                    false
                }
            };

            if expired {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to evict {}: {}", path.display(), e),
                }
            }
        }

        if removed > 0 {
            info!("Evicted {} expired cached results", removed);
        }
        Ok(removed)
    }

    /// Summarises the cache contents
    pub fn stats(&self) -> CoreResult<LocalStoreStats> {
        let mut stats = LocalStoreStats::default();

        for path in self.record_paths()? {
            let entry = fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<CacheEntry>(&c).ok());
            match entry {
                Some(entry) => {
                    stats.entries += 1;
                    stats.oldest = Some(stats.oldest.map_or(entry.stored_at, |t| t.min(entry.stored_at)));
                    stats.newest = Some(stats.newest.map_or(entry.stored_at, |t| t.max(entry.stored_at)));
                }
                None => stats.unreadable += 1,
            }
        }

        Ok(stats)
    }

    /// Removes every cached result
    pub fn clear(&self) -> CoreResult<usize> {
        let mut removed = 0;
        for path in self.record_paths()? {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(CoreError::PersistenceFailure(format!(
                        "Failed to delete cached result {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
        Ok(removed)
    }

    /// Lists record files, skipping scratch files from in-flight writes
    fn record_paths(&self) -> CoreResult<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CoreError::CacheUnavailable(format!(
                    "Failed to read cache directory {}: {}",
                    self.cache_dir.display(),
                    e
                )))
            }
        };

        let mut paths = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") && !is_scratch_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl ResultStore for LocalResultStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        Ok(self.load(fingerprint).map(|entry| entry.result))
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
