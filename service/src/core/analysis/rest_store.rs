//! Shared Result Store (REST)
//!
//! Shared tier reached over a PostgREST-compatible table API:
//!
//! - lookup: `GET {base}/{table}?hash=eq.<fingerprint>&select=result`
//! - upsert: `POST {base}/{table}` with `Prefer: resolution=merge-duplicates`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{ContentFingerprint, CoreError, CoreResult};

use super::{AnalysisResult, ResultStore};
#[cfg(feature = "ai-providers")]
use tracing::debug;

/// Connection settings for the REST shared store
#[derive(Clone, Debug, PartialEq)]
pub struct RestStoreConfig {
    /// REST root, e.g. `https://project.supabase.co/rest/v1`
    pub base_url: String,
    /// Service key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Table name
    pub table: String,
    /// Request timeout; `None` leaves requests unbounded
    pub timeout_secs: Option<u64>,
}

impl RestStoreConfig {
    pub fn new(base_url: &str, table: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            table: table.to_string(),
            timeout_secs: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Table endpoint URL
    pub fn table_url(&self) -> String {
        format!("{}/{}", self.base_url, self.table)
    }
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Deserialize)]
struct ResultRow {
    result: AnalysisResult,
}

#[cfg_attr(not(feature = "ai-providers"), allow(dead_code))]
#[derive(Serialize)]
struct UpsertRow<'a> {
    hash: &'a str,
    result: &'a AnalysisResult,
}

// =============================================================================
// REST Result Store
// =============================================================================

/// Shared result cache behind a PostgREST table
pub struct RestResultStore {
    config: RestStoreConfig,
    #[cfg(feature = "ai-providers")]
    client: reqwest::Client,
}

impl RestResultStore {
    /// Creates the store; fails when the base URL is blank
    pub fn new(config: RestStoreConfig) -> CoreResult<Self> {
        if config.base_url.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "Shared store REST URL is required".to_string(),
            ));
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

    pub fn config(&self) -> &RestStoreConfig {
        &self.config
    }

    #[cfg(feature = "ai-providers")]
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl ResultStore for RestResultStore {
    fn name(&self) -> &str {
        "rest"
    }

    #[cfg(feature = "ai-providers")]
    async fn get(&self, fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        let filter = format!("eq.{}", fingerprint);
        let response = self
            .authorize(self.client.get(self.config.table_url()))
            .query(&[("hash", filter.as_str()), ("select", "result")])
            .send()
            .await
            .map_err(|e| CoreError::CacheUnavailable(format!("Shared cache request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            CoreError::CacheUnavailable(format!("Failed to read shared cache response: {}", e))
        })?;

        if !status.is_success() {
            return Err(CoreError::CacheUnavailable(format!(
                "Shared cache lookup failed ({}): {}",
                status, body
            )));
        }

        let rows: Vec<ResultRow> = serde_json::from_str(&body).map_err(|e| {
            CoreError::CacheUnavailable(format!("Failed to parse shared cache response: {}", e))
        })?;

        Ok(rows.into_iter().next().map(|row| row.result))
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn get(&self, _fingerprint: &ContentFingerprint) -> CoreResult<Option<AnalysisResult>> {
        Err(CoreError::NotSupported(
            "HTTP clients not enabled. Build with --features ai-providers".to_string(),
        ))
    }

    #[cfg(feature = "ai-providers")]
    async fn put(
        &self,
        fingerprint: &ContentFingerprint,
        result: &AnalysisResult,
    ) -> CoreResult<()> {
        let row = UpsertRow {
            hash: fingerprint.as_str(),
            result,
        };

        let response = self
            .authorize(self.client.post(self.config.table_url()))
            .query(&[("on_conflict", "hash")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(&row)
            .send()
            .await
            .map_err(|e| CoreError::PersistenceFailure(format!("Shared cache write failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable response body>".to_string());
            return Err(CoreError::PersistenceFailure(format!(
                "Shared cache write rejected ({}): {}",
                status, body
            )));
        }

        debug!("Stored result {} in shared cache", fingerprint.short());
        Ok(())
    }

    #[cfg(not(feature = "ai-providers"))]
    async fn put(
        &self,
        _fingerprint: &ContentFingerprint,
        _result: &AnalysisResult,
    ) -> CoreResult<()> {
        Err(CoreError::NotSupported(
            "HTTP clients not enabled. Build with --features ai-providers".to_string(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = RestStoreConfig::new("https://db.example.com/rest/v1/", "analysis_cache");
        assert_eq!(
            config.table_url(),
            "https://db.example.com/rest/v1/analysis_cache"
        );
    }

    #[test]
    fn test_blank_url_rejected() {
        let result = RestResultStore::new(RestStoreConfig::new("  ", "analysis_cache"));
        assert!(matches!(result, Err(CoreError::ConfigError(_))));
    }

    #[cfg(feature = "ai-providers")]
    mod http {
        use super::super::*;
        use crate::core::analysis::{sha256_hex, CounterContent, Verdict};
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn sample_result() -> AnalysisResult {
            AnalysisResult::new(
                Verdict::Suspicious,
                50,
                vec!["Needs sources".to_string()],
                CounterContent {
                    fact_check: "fact".to_string(),
                    visual_content: "visual".to_string(),
                    short_form: "short".to_string(),
                },
            )
        }

        fn create_test_store(server: &MockServer) -> RestResultStore {
            let config =
                RestStoreConfig::new(&server.uri(), "analysis_cache").with_api_key("service-key");
            RestResultStore::new(config).unwrap()
        }

        #[tokio::test]
        async fn test_get_hit() {
            let server = MockServer::start().await;
            let fp = sha256_hex("The Earth is flat");

            Mock::given(method("GET"))
                .and(path("/analysis_cache"))
                .and(query_param("hash", format!("eq.{}", fp)))
                .and(query_param("select", "result"))
                .and(header("apikey", "service-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    { "result": sample_result() }
                ])))
                .expect(1)
                .mount(&server)
                .await;

            let store = create_test_store(&server);
            assert_eq!(store.get(&fp).await.unwrap(), Some(sample_result()));
        }

        #[tokio::test]
        async fn test_get_miss() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/analysis_cache"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(&server)
                .await;

            let store = create_test_store(&server);
            assert!(store.get(&sha256_hex("new")).await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_get_server_error_is_cache_error() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(503))
                .mount(&server)
                .await;

            let store = create_test_store(&server);
            let err = store.get(&sha256_hex("x")).await.unwrap_err();
            assert!(matches!(err, CoreError::CacheUnavailable(_)));
        }

        #[tokio::test]
        async fn test_put_upserts() {
            let server = MockServer::start().await;
            let fp = sha256_hex("claim");

            Mock::given(method("POST"))
                .and(path("/analysis_cache"))
                .and(query_param("on_conflict", "hash"))
                .and(header("Prefer", "resolution=merge-duplicates"))
                .and(header("Authorization", "Bearer service-key"))
                .and(body_partial_json(json!({ "hash": fp.as_str() })))
                .respond_with(ResponseTemplate::new(201))
                .expect(1)
                .mount(&server)
                .await;

            let store = create_test_store(&server);
            store.put(&fp, &sample_result()).await.unwrap();
        }

        #[tokio::test]
        async fn test_put_rejection_is_persistence_failure() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
                .mount(&server)
                .await;

            let store = create_test_store(&server);
            let err = store.put(&sha256_hex("x"), &sample_result()).await.unwrap_err();
            assert!(matches!(err, CoreError::PersistenceFailure(_)));
        }
    }
}
