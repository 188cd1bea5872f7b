//! Chat-Completions Oracle
//!
//! Implements the AnalysisOracle trait against an OpenAI-compatible
//! `/chat/completions` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AnalysisOracle, OracleRequest};
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Oracle Config
// =============================================================================

/// Connection settings for a chat-completions oracle
#[derive(Clone, Debug, PartialEq)]
pub struct ChatOracleConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Request timeout; `None` leaves the call unbounded
    pub timeout_secs: Option<u64>,
}

impl ChatOracleConfig {
    /// Default gateway base URL
    pub const DEFAULT_BASE_URL: &'static str = "https://ai.gateway.lovable.dev/v1";

    /// Default analysis model
    pub const DEFAULT_MODEL: &'static str = "google/gemini-2.5-pro";

    pub fn new(api_key: &str) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            timeout_secs: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

// =============================================================================
// Chat-Completions Oracle
// =============================================================================

/// Oracle backed by an OpenAI-compatible chat-completions API
pub struct ChatCompletionsOracle {
    config: ChatOracleConfig,
    #[cfg(feature = "ai-providers")]
    client: reqwest::Client,
}

impl ChatCompletionsOracle {
    /// Creates a new oracle; the API key must be non-empty
    pub fn new(config: ChatOracleConfig) -> CoreResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(CoreError::ConfigError("API key not configured".to_string()));
        }

        #[cfg(feature = "ai-providers")]
        let client = {
            let mut builder = reqwest::Client::builder();
            if let Some(secs) = config.timeout_secs {
                builder = builder.timeout(std::time::Duration::from_secs(secs));
            }
            builder
                .build()
                .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?
        };

        Ok(Self {
            config,
            #[cfg(feature = "ai-providers")]
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

// =============================================================================
// API Types
// =============================================================================

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
fn build_request<'a>(model: &'a str, request: OracleRequest) -> ChatCompletionRequest<'a> {
    let user_content = match request.image_data_url {
        Some(url) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: request.prompt,
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
        ]),
        None => MessageContent::Text(request.prompt),
    };

    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: MessageContent::Text(request.system),
            },
            ChatMessage {
                role: "user",
                content: user_content,
            },
        ],
        temperature: request.temperature,
        response_format: request.json_mode.then_some(ResponseFormat {
            format_type: "json_object",
        }),
    }
}

// =============================================================================
// AnalysisOracle Implementation
// =============================================================================

#[async_trait]
impl AnalysisOracle for ChatCompletionsOracle {
    fn name(&self) -> &str {
        "chat-completions"
    }

    #[cfg(feature = "ai-providers")]
    async fn complete(&self, request: OracleRequest) -> CoreResult<String> {
        let api_request = build_request(&self.config.model, request);

        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| CoreError::OracleError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::OracleError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::warn!("Oracle returned {}: {}", status, body);
            return Err(CoreError::OracleError(format!(
                "AI API error: {}",
                status.as_u16()
            )));
        }

        let api_response: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| CoreError::OracleError(format!("Failed to parse response: {}", e)))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CoreError::OracleError("No completion content returned".to_string()))
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn complete(&self, _request: OracleRequest) -> CoreResult<String> {
        Err(CoreError::NotSupported(
            "AI providers feature not enabled. Build with --features ai-providers".to_string(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
