//! Content Analysis Pipeline
//!
//! Content identity, two-tier result caching and oracle dispatch.
//!
//! ## Flow
//!
//! `AnalysisOrchestrator` -> `ContentIdentifier` -> `LocalResultStore`
//! -> (miss) shared `ResultStore` -> (miss) `AnalysisDispatcher`
//! -> normalize -> persist to both tiers -> return.
//!
//! Local results are stored one file per fingerprint:
//! `{data_dir}/analysis-results/{fingerprint}.json`

pub mod chat_oracle;
pub mod counter_content;
pub mod dispatcher;
pub mod fingerprint;
pub mod local_store;
pub mod models;
pub mod normalize;
pub mod oracle;
pub mod orchestrator;
pub mod progress;
pub mod rest_store;
pub mod shared_store;
pub mod store;

pub use chat_oracle::{ChatCompletionsOracle, ChatOracleConfig};
pub use counter_content::{
    CounterContentRule, CounterContentRules, CLIMATE_RULE, DEFAULT_RULE, DEFAULT_RULES,
};
pub use dispatcher::{map_report, AnalysisDispatcher, MEDIA_TEMPERATURE, TEXT_TEMPERATURE};
pub use fingerprint::{sha256_hex, ContentIdentifier};
pub use local_store::{LocalResultStore, LocalStoreStats, DEFAULT_TTL_HOURS, RESULTS_DIR_NAME};
pub use models::*;
pub use normalize::{Claim, NormalizedReport, OracleReport};
pub use oracle::{AnalysisOracle, OracleRequest, ScriptedOracle, UnconfiguredOracle};
pub use orchestrator::{AnalysisOrchestrator, AnalysisOutcome, ResultSource};
pub use progress::{ChannelProgress, NoopProgress, ProgressReporter, ProgressStage, ProgressUpdate};
pub use rest_store::{RestResultStore, RestStoreConfig};
pub use shared_store::{SqliteResultStore, SHARED_TABLE_NAME};
pub use store::{DisabledStore, ResultStore};
