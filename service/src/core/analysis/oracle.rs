//! Analysis Oracle
//!
//! Defines the trait and request type for the external analysis oracle.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::core::{CoreError, CoreResult};

// =============================================================================
// Oracle Trait
// =============================================================================

/// External service that judges a submission and replies with JSON
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    /// Returns the oracle name
    fn name(&self) -> &str;

    /// Sends one request and returns the raw message content
    async fn complete(&self, request: OracleRequest) -> CoreResult<String>;
}

// =============================================================================
// Oracle Request
// =============================================================================

/// A single-turn oracle request
#[derive(Clone, Debug, PartialEq)]
pub struct OracleRequest {
    /// System instructions
    pub system: String,
    /// User message text
    pub prompt: String,
    /// Inline image as a `data:` URL, sent alongside the prompt
    pub image_data_url: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask for a strict JSON object
    pub json_mode: bool,
}

impl OracleRequest {
    pub fn new(system: &str, prompt: &str) -> Self {
        Self {
            system: system.to_string(),
            prompt: prompt.to_string(),
            image_data_url: None,
            temperature: 0.3,
            json_mode: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_image(mut self, data_url: String) -> Self {
        self.image_data_url = Some(data_url);
        self
    }

    /// Returns whether the request carries an image part
    pub fn is_multimodal(&self) -> bool {
        self.image_data_url.is_some()
    }
}

// =============================================================================
// Unconfigured Oracle
// =============================================================================

/// Stand-in used when no oracle is configured; cache hits still resolve
pub struct UnconfiguredOracle {
    reason: String,
}

impl UnconfiguredOracle {
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl AnalysisOracle for UnconfiguredOracle {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn complete(&self, _request: OracleRequest) -> CoreResult<String> {
        Err(CoreError::ConfigError(self.reason.clone()))
    }
}

// =============================================================================
// Scripted Oracle (for testing)
// =============================================================================

/// In-process oracle replaying canned replies and counting calls
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<CoreResult<String>>>,
    fallback: Result<String, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    /// Oracle that always replies with `content`
    pub fn replying(content: &str) -> Self {
        Self::with_fallback(Ok(content.to_string()))
    }

    /// Oracle that always fails with an oracle error
    pub fn failing(message: &str) -> Self {
        Self::with_fallback(Err(message.to_string()))
    }

    fn with_fallback(fallback: Result<String, String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a one-off reply served before the fallback
    pub fn then_reply(self, reply: CoreResult<String>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most recent request, if any
    pub fn last_request(&self) -> Option<OracleRequest> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }

    fn clone_fallback(&self) -> CoreResult<String> {
        self.fallback.clone().map_err(CoreError::OracleError)
    }
}

#[async_trait]
impl AnalysisOracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: OracleRequest) -> CoreResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let queued = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        queued.unwrap_or_else(|| self.clone_fallback())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = OracleRequest::new("system", "prompt")
            .with_temperature(0.2)
            .with_image("data:image/png;base64,AAAA".to_string());

        assert_eq!(request.temperature, 0.2);
        assert!(request.json_mode);
        assert!(request.is_multimodal());
    }

    #[tokio::test]
    async fn test_scripted_oracle_replays_queue_then_fallback() {
        let oracle = ScriptedOracle::replying("{}")
            .then_reply(Err(CoreError::OracleError("boom".to_string())));

        assert!(oracle.complete(OracleRequest::new("s", "first")).await.is_err());
        assert_eq!(oracle.complete(OracleRequest::new("s", "second")).await.unwrap(), "{}");
        assert_eq!(oracle.calls(), 2);
        assert_eq!(oracle.last_request().unwrap().prompt, "second");
    }

    #[tokio::test]
    async fn test_unconfigured_oracle_reports_config_error() {
        let oracle = UnconfiguredOracle::new("API key not configured");
        let err = oracle
            .complete(OracleRequest::new("sys", "prompt"))
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::ConfigError(ref msg) if msg == "API key not configured"));
    }

    #[tokio::test]
    async fn test_failing_oracle() {
        let oracle = ScriptedOracle::failing("AI API error: 500");
        let err = oracle.complete(OracleRequest::new("s", "p")).await.unwrap_err();
        assert!(matches!(err, CoreError::OracleError(_)));
    }
}
