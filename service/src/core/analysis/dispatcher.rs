//! Analysis Dispatcher
//!
//! Routes a submission to its modality-specific oracle request, parses the
//! reply and normalizes it. [`map_report`] then collapses the normalized
//! report into the canonical [`AnalysisResult`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;

use tracing::{debug, info};

use super::{
    AnalysisOracle, AnalysisResult, CounterContentRules, FileRef, Modality, NormalizedReport,
    OracleReport, OracleRequest, Submission, Verdict, MAX_ISSUES,
};
use crate::core::CoreResult;

/// Default temperature for text and URL analysis
pub const TEXT_TEMPERATURE: f32 = 0.3;

/// Default temperature for media forensics
pub const MEDIA_TEMPERATURE: f32 = 0.2;

const RESPONSE_SHAPE: &str = r#"Reply with one JSON object only:
{
  "claims": [{"text": "...", "score": 0-100, "status": "...", "explanation": "...", "sources": ["..."]}],
  "truthScore": 0-100,
  "status": "verified" | "partially-verified" | "unverified" | "false" | "manipulated",
  "overallExplanation": "...",
  "detailedAnalysis": "...",
  "warnings": ["..."],
  "metadata": {}
}"#;

const TEXT_INSTRUCTIONS: &str = "You are a fact-checking engine. Extract every factual claim \
from the submitted text, rate each claim's accuracy from 0 to 100 with supporting or \
contradicting evidence, flag manipulation tactics such as emotional language or logical \
fallacies, and give an overall truth score.";

const URL_INSTRUCTIONS: &str = "You are a fact-checking engine assessing a web address. Judge \
the domain's reputation, known misinformation sources, citation quality and signs of \
clickbait or bias, and rate the credibility of any claims the page is known to make.";

const IMAGE_INSTRUCTIONS: &str = "You are a media forensics engine for still images. Look for \
signs of AI generation, splicing, cloning or retouching, lighting and shadow \
inconsistencies, compression artifacts and misleading framing. Report technical indicators \
in metadata.";

const VIDEO_INSTRUCTIONS: &str = "You are a media forensics engine for video. Look for deepfake \
face swaps, lip-sync drift, frame-to-frame inconsistencies, splices and encoding anomalies. \
Use status \"manipulated\" when tampering is likely. Report technical indicators in metadata.";

const AUDIO_INSTRUCTIONS: &str = "You are a media forensics engine for audio. Look for cloned \
or synthetic voices, text-to-speech artifacts, splicing, pitch shifting and background noise \
discontinuities. Use status \"manipulated\" when tampering is likely. Report acoustic \
indicators in metadata.";

// =============================================================================
// Analysis Dispatcher
// =============================================================================

/// Modality router in front of the analysis oracle
pub struct AnalysisDispatcher {
    oracle: Arc<dyn AnalysisOracle>,
    text_temperature: f32,
    media_temperature: f32,
}

impl AnalysisDispatcher {
    pub fn new(oracle: Arc<dyn AnalysisOracle>) -> Self {
        Self {
            oracle,
            text_temperature: TEXT_TEMPERATURE,
            media_temperature: MEDIA_TEMPERATURE,
        }
    }

    /// Overrides the sampling temperatures
    pub fn with_temperatures(mut self, text: f32, media: f32) -> Self {
        self.text_temperature = text;
        self.media_temperature = media;
        self
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Builds the oracle request for a submission
    pub fn build_request(&self, submission: &Submission) -> OracleRequest {
        let (instructions, prompt) = match submission {
            Submission::Text(text) => (
                TEXT_INSTRUCTIONS,
                format!("Analyze this text for truthfulness:\n\n{}", text),
            ),
            Submission::Url(url) => (
                URL_INSTRUCTIONS,
                format!("Analyze this URL for credibility and truth:\n\n{}", url),
            ),
            Submission::Image(file) if file.data.is_some() => (
                IMAGE_INSTRUCTIONS,
                format!(
                    "Analyze this image for authenticity and manipulation. Filename: {}",
                    file.name
                ),
            ),
            Submission::Image(file) => (
                IMAGE_INSTRUCTIONS,
                format!("Analyze image metadata and context for: {}", file.name),
            ),
            Submission::Video(file) => (
                VIDEO_INSTRUCTIONS,
                format!(
                    "Analyze this video file for deepfakes and manipulation: {}",
                    file.name
                ),
            ),
            Submission::Audio(file) => (
                AUDIO_INSTRUCTIONS,
                format!(
                    "Analyze this audio file for voice cloning and manipulation: {}",
                    file.name
                ),
            ),
        };

        let system = format!("{}\n\n{}", instructions, RESPONSE_SHAPE);
        let temperature = if submission.modality().is_media() {
            self.media_temperature
        } else {
            self.text_temperature
        };

        let request = OracleRequest::new(&system, &prompt).with_temperature(temperature);
        match submission {
            Submission::Image(file) => match image_data_url(file) {
                Some(url) => request.with_image(url),
                None => request,
            },
            _ => request,
        }
    }

    /// Runs one oracle round-trip and normalizes the reply.
    ///
    /// Oracle failures and malformed replies are fatal; nothing is retried.
    pub async fn analyze(&self, submission: &Submission) -> CoreResult<NormalizedReport> {
        let request = self.build_request(submission);
        info!(
            "Dispatching {} analysis to {}",
            submission.modality(),
            self.oracle.name()
        );

        let content = self.oracle.complete(request).await?;
        let report = OracleReport::parse(&content)?.normalize();
        debug!(
            "Oracle scored {} as {} ({})",
            submission.modality(),
            report.status,
            report.truth_score
        );
        Ok(report)
    }
}

/// Encodes an image's bytes as a `data:` URL
fn image_data_url(file: &FileRef) -> Option<String> {
    let data = file.data.as_ref()?;
    let mime = file
        .mime_type
        .as_deref()
        .filter(|m| Modality::from_mime(m) == Some(Modality::Image))
        .unwrap_or("application/octet-stream");
    Some(format!("data:{};base64,{}", mime, BASE64.encode(data)))
}

// =============================================================================
// Result Mapping
// =============================================================================

/// Maps a normalized report into the canonical result.
///
/// Issues come from the oracle's warnings, or from claim summaries when it
/// gave none. Counter-content is chosen from the submission's display text.
pub fn map_report(
    report: &NormalizedReport,
    submission: &Submission,
    rules: &CounterContentRules,
) -> AnalysisResult {
    let issues: Vec<String> = if report.warnings.is_empty() {
        report
            .claims
            .iter()
            .filter_map(|claim| claim.summary())
            .take(MAX_ISSUES)
            .map(str::to_string)
            .collect()
    } else {
        report.warnings.iter().take(MAX_ISSUES).cloned().collect()
    };

    AnalysisResult::new(
        Verdict::from_oracle_status(&report.status),
        report.truth_score,
        issues,
        rules.select(&submission.display_content()),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{ScriptedOracle, CLIMATE_RULE, DEFAULT_RULE};
    use crate::core::CoreError;
    use serde_json::json;

    fn create_test_dispatcher(reply: &str) -> (Arc<ScriptedOracle>, AnalysisDispatcher) {
        let oracle = Arc::new(ScriptedOracle::replying(reply));
        let dispatcher = AnalysisDispatcher::new(oracle.clone());
        (oracle, dispatcher)
    }

    // -------------------------------------------------------------------------
    // Routing
    // -------------------------------------------------------------------------

    #[test]
    fn test_text_request() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");
        let request = dispatcher.build_request(&Submission::text("The Earth is flat"));

        assert!(request.system.contains("factual claim"));
        assert!(request.system.contains("truthScore"));
        assert!(request.prompt.ends_with("The Earth is flat"));
        assert_eq!(request.temperature, TEXT_TEMPERATURE);
        assert!(request.json_mode);
        assert!(!request.is_multimodal());
    }

    #[test]
    fn test_url_request() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");
        let request = dispatcher.build_request(&Submission::url("https://example.com/story"));

        assert!(request.system.contains("domain"));
        assert!(request.prompt.contains("https://example.com/story"));
        assert_eq!(request.temperature, TEXT_TEMPERATURE);
    }

    #[test]
    fn test_media_requests_use_forensic_framing() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");

        let video = dispatcher.build_request(&Submission::Video(FileRef::new("clip.mp4", 10)));
        assert!(video.system.contains("deepfake"));
        assert_eq!(video.temperature, MEDIA_TEMPERATURE);

        let audio = dispatcher.build_request(&Submission::Audio(FileRef::new("call.mp3", 10)));
        assert!(audio.system.contains("synthetic voices"));
        assert!(audio.prompt.contains("call.mp3"));
    }

    #[test]
    fn test_image_with_bytes_is_multimodal() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");
        let file = FileRef::new("photo.png", 0)
            .with_data(b"png".to_vec())
            .with_mime_type("image/png");
        let request = dispatcher.build_request(&Submission::Image(file));

        assert_eq!(
            request.image_data_url.as_deref(),
            Some("data:image/png;base64,cG5n")
        );
        assert!(request.prompt.contains("Filename: photo.png"));
    }

    #[test]
    fn test_image_without_bytes_sends_name_only() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");
        let request = dispatcher.build_request(&Submission::Image(FileRef::new("photo.png", 7)));

        assert!(!request.is_multimodal());
        assert!(request.prompt.contains("photo.png"));
    }

    #[test]
    fn test_custom_temperatures() {
        let (_oracle, dispatcher) = create_test_dispatcher("{}");
        let dispatcher = dispatcher.with_temperatures(0.5, 0.1);
        assert_eq!(dispatcher.build_request(&Submission::text("x")).temperature, 0.5);
        assert_eq!(
            dispatcher
                .build_request(&Submission::Audio(FileRef::new("a.wav", 1)))
                .temperature,
            0.1
        );
    }

    // -------------------------------------------------------------------------
    // Analyze
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_analyze_normalizes_reply() {
        let (oracle, dispatcher) = create_test_dispatcher("{}");
        let report = dispatcher.analyze(&Submission::text("claim")).await.unwrap();

        assert_eq!(report.truth_score, 50);
        assert_eq!(report.status, "unverified");
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_propagates_oracle_failure() {
        let oracle = Arc::new(ScriptedOracle::failing("AI API error: 500"));
        let dispatcher = AnalysisDispatcher::new(oracle.clone());

        let err = dispatcher.analyze(&Submission::text("claim")).await.unwrap_err();
        assert!(matches!(err, CoreError::OracleError(_)));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_analyze_rejects_malformed_reply() {
        let (_oracle, dispatcher) = create_test_dispatcher("definitely not json");
        let err = dispatcher.analyze(&Submission::text("claim")).await.unwrap_err();
        assert!(matches!(err, CoreError::OracleError(_)));
    }

    // -------------------------------------------------------------------------
    // Mapping
    // -------------------------------------------------------------------------

    fn report_from(value: serde_json::Value) -> NormalizedReport {
        OracleReport::parse(&value.to_string()).unwrap().normalize()
    }

    #[test]
    fn test_map_flat_earth() {
        let report = report_from(json!({
            "status": "false",
            "truthScore": 5,
            "claims": [{ "explanation": "Contradicted by satellite imagery" }]
        }));
        let result = map_report(
            &report,
            &Submission::text("The Earth is flat"),
            &CounterContentRules::default(),
        );

        assert_eq!(result.status, Verdict::False);
        assert_eq!(result.confidence, 5);
        assert_eq!(result.issues, vec!["Contradicted by satellite imagery"]);
        assert_eq!(result.counter_content.fact_check, DEFAULT_RULE.fact_check);
    }

    #[test]
    fn test_map_prefers_warnings_and_caps_issues() {
        let report = report_from(json!({
            "status": "partially-verified",
            "warnings": ["a", "b", "c", "d"],
            "claims": [{ "explanation": "ignored" }]
        }));
        let result = map_report(
            &report,
            &Submission::text("Climate change is exaggerated"),
            &CounterContentRules::default(),
        );

        assert_eq!(result.status, Verdict::Suspicious);
        assert_eq!(result.issues, vec!["a", "b", "c"]);
        assert_eq!(result.counter_content.fact_check, CLIMATE_RULE.fact_check);
    }

    #[test]
    fn test_map_status_vocabulary() {
        let rules = CounterContentRules::default();
        let sub = Submission::text("x");
        for (status, verdict) in [
            ("verified", Verdict::Verified),
            ("manipulated", Verdict::False),
            ("unverified", Verdict::Suspicious),
            ("authentic", Verdict::Suspicious),
        ] {
            let report = report_from(json!({ "status": status }));
            assert_eq!(map_report(&report, &sub, &rules).status, verdict, "{status}");
        }
    }

    #[test]
    fn test_map_media_uses_display_content() {
        let report = report_from(json!({}));
        let sub = Submission::Video(FileRef::new("global warming hoax.mp4", 10));
        let result = map_report(&report, &sub, &CounterContentRules::default());
        assert_eq!(result.counter_content.fact_check, CLIMATE_RULE.fact_check);
    }
}
