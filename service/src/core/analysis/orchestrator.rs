//! Analysis Orchestrator
//!
//! Top-level coordinator of one analysis run:
//!
//! 1. validate the submission
//! 2. fingerprint it
//! 3. local tier lookup (hit ends the run)
//! 4. shared tier lookup (hit warms the local tier and ends the run)
//! 5. dispatch to the oracle, then map the report with counter-content
//! 6. persist to both tiers, best-effort
//! 7. return the result
//!
//! Cache tier failures are logged and treated as misses. Validation and
//! oracle failures end the run with no partial result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::core::{ContentFingerprint, CoreResult};

use super::{
    map_report, AnalysisDispatcher, AnalysisResult, ContentIdentifier, CounterContentRules,
    ProgressReporter, ProgressStage, ResultStore, Submission,
};

// =============================================================================
// Outcome
// =============================================================================

/// Where a returned result came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    LocalCache,
    SharedCache,
    Fresh,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::LocalCache => "local_cache",
            ResultSource::SharedCache => "shared_cache",
            ResultSource::Fresh => "fresh",
        }
    }

    pub fn is_cached(&self) -> bool {
        !matches!(self, ResultSource::Fresh)
    }
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub fingerprint: ContentFingerprint,
    pub result: AnalysisResult,
    pub source: ResultSource,
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Coordinates fingerprinting, both cache tiers and the dispatcher
pub struct AnalysisOrchestrator {
    identifier: ContentIdentifier,
    /// Device-local tier
    local: Arc<dyn ResultStore>,
    /// Shared tier
    shared: Arc<dyn ResultStore>,
    dispatcher: AnalysisDispatcher,
    rules: CounterContentRules,
}

impl AnalysisOrchestrator {
    pub fn new(
        local: Arc<dyn ResultStore>,
        shared: Arc<dyn ResultStore>,
        dispatcher: AnalysisDispatcher,
    ) -> Self {
        Self {
            identifier: ContentIdentifier::new(),
            local,
            shared,
            dispatcher,
            rules: CounterContentRules::default(),
        }
    }

    /// Replaces the counter-content rule table
    pub fn with_rules(mut self, rules: CounterContentRules) -> Self {
        self.rules = rules;
        self
    }

    /// Runs the pipeline for one submission.
    ///
    /// Always emits a terminal progress event: `Completed` on success or
    /// `Failed` (percent 0) on error.
    pub async fn run(
        &self,
        submission: &Submission,
        progress: &dyn ProgressReporter,
    ) -> CoreResult<AnalysisOutcome> {
        progress.report(ProgressStage::Started.into());

        match self.run_stages(submission, progress).await {
            Ok(outcome) => {
                progress.report(ProgressStage::Completed.into());
                Ok(outcome)
            }
            Err(e) => {
                if e.is_validation_error() {
                    warn!("Rejected {} submission: {}", submission.modality(), e);
                } else {
                    error!("Analysis of {} submission failed: {}", submission.modality(), e);
                }
                progress.report(ProgressStage::Failed.into());
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        submission: &Submission,
        progress: &dyn ProgressReporter,
    ) -> CoreResult<AnalysisOutcome> {
        submission.validate()?;

        let fingerprint = self.identifier.fingerprint(submission);
        debug!(
            "Fingerprinted {} submission as {}",
            submission.modality(),
            fingerprint
        );

        // Tier 1
        let local_hit = self.lookup(self.local.as_ref(), &fingerprint).await;
        progress.report(ProgressStage::LocalCacheChecked.into());
        if let Some(result) = local_hit {
            info!("Local cache hit for {}", fingerprint.short());
            return Ok(AnalysisOutcome {
                fingerprint,
                result,
                source: ResultSource::LocalCache,
            });
        }

        // Tier 2
        let shared_hit = self.lookup(self.shared.as_ref(), &fingerprint).await;
        progress.report(ProgressStage::SharedCacheChecked.into());
        if let Some(result) = shared_hit {
            info!("Shared cache hit for {}", fingerprint.short());
            self.persist(self.local.as_ref(), &fingerprint, &result).await;
            return Ok(AnalysisOutcome {
                fingerprint,
                result,
                source: ResultSource::SharedCache,
            });
        }

        info!("Cache miss for {}, performing new analysis", fingerprint.short());
        progress.report(ProgressStage::DispatchStarted.into());
        let report = self.dispatcher.analyze(submission).await?;
        progress.report(ProgressStage::DispatchCompleted.into());

        let result = map_report(&report, submission, &self.rules);

        self.persist(self.shared.as_ref(), &fingerprint, &result).await;
        self.persist(self.local.as_ref(), &fingerprint, &result).await;

        Ok(AnalysisOutcome {
            fingerprint,
            result,
            source: ResultSource::Fresh,
        })
    }

    /// Reads one tier; any store error counts as a miss
    async fn lookup(
        &self,
        store: &dyn ResultStore,
        fingerprint: &ContentFingerprint,
    ) -> Option<AnalysisResult> {
        match store.get(fingerprint).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(
                    "{} cache lookup for {} failed, treating as miss: {}",
                    store.name(),
                    fingerprint.short(),
                    e
                );
                None
            }
        }
    }

    /// Writes one tier; failures are logged and swallowed
    async fn persist(
        &self,
        store: &dyn ResultStore,
        fingerprint: &ContentFingerprint,
        result: &AnalysisResult,
    ) {
        if let Err(e) = store.put(fingerprint, result).await {
            warn!(
                "Failed to cache result {} in {} store: {}",
                fingerprint.short(),
                store.name(),
                e
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
