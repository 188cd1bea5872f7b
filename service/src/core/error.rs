//! TruthGen Error Definitions
//!
//! Defines error types used throughout the analysis pipeline.

use thiserror::Error;

/// Message shown to callers when an analysis fails for a reason they cannot fix.
pub const GENERIC_FAILURE_MESSAGE: &str = "Could not analyze content. Please try again.";

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Submission Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    // =========================================================================
    // Oracle Errors
    // =========================================================================
    #[error("Oracle request failed: {0}")]
    OracleError(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Returns true for errors the pipeline downgrades to a cache miss
    pub fn is_cache_error(&self) -> bool {
        matches!(
            self,
            CoreError::CacheUnavailable(_) | CoreError::PersistenceFailure(_)
        )
    }

    /// Returns true for errors caused by the submission itself
    pub fn is_validation_error(&self) -> bool {
        matches!(self, CoreError::ValidationError(_))
    }

    /// Converts to the message surfaced to end users.
    ///
    /// Validation problems are shown verbatim; everything else collapses to a
    /// generic failure so oracle and storage internals never leak.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::ValidationError(msg) => msg.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}
