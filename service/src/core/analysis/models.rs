//! Analysis Data Models
//!
//! Submission input, the canonical result shape, and the cache record that
//! both result tiers persist.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{ContentFingerprint, CoreError, CoreResult, EpochMillis};

/// Maximum number of issues carried by a result
pub const MAX_ISSUES: usize = 3;

/// Message returned when a submission has nothing to analyze
pub const EMPTY_SUBMISSION_MESSAGE: &str =
    "Please enter some text, URL, or upload a file to analyze.";

// =============================================================================
// Modality
// =============================================================================

/// Kind of content being submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Url,
    Image,
    Video,
    Audio,
}

impl Modality {
    /// Returns true for the file-backed modalities
    pub fn is_media(&self) -> bool {
        matches!(self, Modality::Image | Modality::Video | Modality::Audio)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Url => "url",
            Modality::Image => "image",
            Modality::Video => "video",
            Modality::Audio => "audio",
        }
    }

    /// Maps a MIME type's top-level kind (`image/png` -> image) to a media modality
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split('/').next()?.trim().to_ascii_lowercase().as_str() {
            "image" => Some(Modality::Image),
            "video" => Some(Modality::Video),
            "audio" => Some(Modality::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "url" => Ok(Modality::Url),
            "image" => Ok(Modality::Image),
            "video" => Ok(Modality::Video),
            "audio" => Ok(Modality::Audio),
            other => Err(CoreError::ValidationError(format!(
                "Invalid analysis type: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// Submission
// =============================================================================

/// Reference to an uploaded media file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRef {
    /// Original file name
    pub name: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// MIME type, when known
    pub mime_type: Option<String>,
    /// Raw file bytes, when the caller uploaded them
    pub data: Option<Vec<u8>>,
}

impl FileRef {
    /// Creates a file reference without content bytes
    pub fn new(name: &str, size_bytes: u64) -> Self {
        Self {
            name: name.to_string(),
            size_bytes,
            mime_type: None,
            data: None,
        }
    }

    /// Attaches the file bytes; the size follows the payload
    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.size_bytes = data.len() as u64;
        self.data = Some(data);
        self
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_string());
        self
    }
}

/// A single unit of content submitted for analysis.
///
/// Exactly one payload is active per variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Text(String),
    Url(String),
    Image(FileRef),
    Video(FileRef),
    Audio(FileRef),
}

impl Submission {
    pub fn text(text: &str) -> Self {
        Submission::Text(text.to_string())
    }

    pub fn url(url: &str) -> Self {
        Submission::Url(url.to_string())
    }

    /// Builds a media submission for the given modality
    pub fn media(modality: Modality, file: FileRef) -> CoreResult<Self> {
        match modality {
            Modality::Image => Ok(Submission::Image(file)),
            Modality::Video => Ok(Submission::Video(file)),
            Modality::Audio => Ok(Submission::Audio(file)),
            Modality::Text | Modality::Url => Err(CoreError::ValidationError(format!(
                "{} is not a media modality",
                modality
            ))),
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Submission::Text(_) => Modality::Text,
            Submission::Url(_) => Modality::Url,
            Submission::Image(_) => Modality::Image,
            Submission::Video(_) => Modality::Video,
            Submission::Audio(_) => Modality::Audio,
        }
    }

    pub fn file(&self) -> Option<&FileRef> {
        match self {
            Submission::Image(f) | Submission::Video(f) | Submission::Audio(f) => Some(f),
            Submission::Text(_) | Submission::Url(_) => None,
        }
    }

    /// Rejects submissions without a usable payload
    pub fn validate(&self) -> CoreResult<()> {
        let usable = match self {
            Submission::Text(s) | Submission::Url(s) => !s.trim().is_empty(),
            Submission::Image(f) | Submission::Video(f) | Submission::Audio(f) => {
                !f.name.trim().is_empty()
            }
        };
        if usable {
            Ok(())
        } else {
            Err(CoreError::ValidationError(
                EMPTY_SUBMISSION_MESSAGE.to_string(),
            ))
        }
    }

    /// Human-readable description of what was submitted.
    ///
    /// Counter-content topic matching runs over this string.
    pub fn display_content(&self) -> String {
        match self {
            Submission::Text(s) | Submission::Url(s) => s.clone(),
            Submission::Image(f) | Submission::Video(f) | Submission::Audio(f) => {
                format!("Analyzing {} file: {}", self.modality(), f.name)
            }
        }
    }
}

// =============================================================================
// Analysis Result
// =============================================================================

/// Three-way credibility verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Verified,
    Suspicious,
    False,
}

impl Verdict {
    /// Collapses the oracle's open status vocabulary into three verdicts
    pub fn from_oracle_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "verified" => Verdict::Verified,
            "false" | "manipulated" => Verdict::False,
            _ => Verdict::Suspicious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::Suspicious => "suspicious",
            Verdict::False => "false",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated counter-messaging attached to a verdict
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterContent {
    /// Long-form fact-check paragraph
    pub fact_check: String,
    /// Description of a suggested visual
    pub visual_content: String,
    /// Social-media sized message
    pub short_form: String,
}

/// Canonical result returned to callers and stored in both cache tiers
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub status: Verdict,
    /// Confidence score (0 - 100)
    pub confidence: u8,
    /// Short issue descriptions, at most [`MAX_ISSUES`]
    pub issues: Vec<String>,
    pub counter_content: CounterContent,
}

impl AnalysisResult {
    /// Creates a result, clamping confidence and truncating issues
    pub fn new(
        status: Verdict,
        confidence: u8,
        mut issues: Vec<String>,
        counter_content: CounterContent,
    ) -> Self {
        issues.truncate(MAX_ISSUES);
        Self {
            status,
            confidence: confidence.min(100),
            issues,
            counter_content,
        }
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// A stored result, persisted as `{hash, ...result, timestamp}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "hash")]
    pub fingerprint: ContentFingerprint,
    #[serde(flatten)]
    pub result: AnalysisResult,
    /// Storage time in epoch milliseconds
    #[serde(rename = "timestamp")]
    pub stored_at: EpochMillis,
}

impl CacheEntry {
    pub fn new(fingerprint: ContentFingerprint, result: AnalysisResult, stored_at: EpochMillis) -> Self {
        Self {
            fingerprint,
            result,
            stored_at,
        }
    }

    /// An entry expires once strictly more than `ttl_millis` has elapsed
    pub fn is_expired(&self, now: EpochMillis, ttl_millis: i64) -> bool {
        now - self.stored_at > ttl_millis
    }
}

// =============================================================================
// Tests
// =============================================================================
