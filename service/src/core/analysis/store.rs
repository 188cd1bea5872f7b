//! Result Store Trait
//!
//! Interface shared by the local and shared cache tiers.

use async_trait::async_trait;

use crate::core::{ContentFingerprint, CoreResult};

use super::AnalysisResult;

/// Fingerprint-keyed result cache.
///
/// Implementations report storage problems as `CacheUnavailable` (reads) or
/// `PersistenceFailure` (writes). The orchestrator downgrades both; stores do
/// not need to swallow them.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Returns the store name for logs
    fn name(&self) -> &str;

    /// Looks up a result
    async fn get(&self, fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>>;

    /// Stores a result, overwriting any existing entry for the fingerprint
    async fn put(&self, fingerprint: &ContentFingerprint, result: &AnalysisResult)
        -> CoreResult<()>;
}

/// Store that never hits and discards writes (shared tier disabled)
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledStore;

#[async_trait]
impl ResultStore for DisabledStore {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn get(&self, _fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        Ok(None)
    }

    async fn put(
        &self,
        _fingerprint: &ContentFingerprint,
        _result: &AnalysisResult,
    ) -> CoreResult<()> {
        Ok(())
    }
}
