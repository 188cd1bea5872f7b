//! Analysis Progress
//!
//! Lifecycle events emitted by the orchestrator. Percentages are fixed per
//! stage and only rise within a run; the terminal `Failed` stage resets to 0.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Pipeline stage reached by a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Started,
    LocalCacheChecked,
    SharedCacheChecked,
    DispatchStarted,
    DispatchCompleted,
    Completed,
    Failed,
}

impl ProgressStage {
    /// Progress percentage (0-100) shown for this stage
    pub fn percent(&self) -> u8 {
        match self {
            ProgressStage::Started => 0,
            ProgressStage::LocalCacheChecked => 20,
            ProgressStage::SharedCacheChecked => 40,
            ProgressStage::DispatchStarted => 50,
            ProgressStage::DispatchCompleted => 90,
            ProgressStage::Completed => 100,
            ProgressStage::Failed => 0,
        }
    }

    /// Returns true for the stages that end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Completed | ProgressStage::Failed)
    }
}

/// Progress update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub stage: ProgressStage,
    /// Progress percentage (0-100)
    pub percent: u8,
}

impl From<ProgressStage> for ProgressUpdate {
    fn from(stage: ProgressStage) -> Self {
        Self {
            stage,
            percent: stage.percent(),
        }
    }
}

// =============================================================================
// Reporters
// =============================================================================

/// Receiver of progress updates; must not block
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards every update
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Forwards updates into a tokio channel; a closed receiver is ignored
#[derive(Clone, Debug)]
pub struct ChannelProgress {
    tx: UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(tx: UnboundedSender<ProgressUpdate>) -> Self {
        Self { tx }
    }
}

impl ProgressReporter for ChannelProgress {
    fn report(&self, update: ProgressUpdate) {
        let _ = self.tx.send(update);
    }
}

impl<F> ProgressReporter for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        self(update)
    }
}
