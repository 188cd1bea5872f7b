//! Oracle Response Normalization
//!
//! The oracle is asked for strict JSON but its field set drifts between
//! prompts and models. [`OracleReport`] captures whatever arrived without
//! interpreting it; [`OracleReport::normalize`] turns it into a
//! [`NormalizedReport`] where every field has a value.
//!
//! Defaults for absent fields:
//!
//! | field                | fallback chain                        |
//! |----------------------|---------------------------------------|
//! | `truthScore`         | `score`, then 50                      |
//! | `status`             | `"unverified"`                        |
//! | `claims`             | `[]`                                  |
//! | `overallExplanation` | `explanation`, then "Analysis completed" |
//! | `detailedAnalysis`   | `details`, then `""`                  |
//! | `warnings`           | `[]`                                  |
//! | `metadata`           | `{}`                                  |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{CoreError, CoreResult};

pub const DEFAULT_TRUTH_SCORE: u8 = 50;
pub const DEFAULT_STATUS: &str = "unverified";
pub const DEFAULT_EXPLANATION: &str = "Analysis completed";

// =============================================================================
// Intermediate Report
// =============================================================================

/// Loosely-typed oracle payload; every field is optional and uninterpreted
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleReport {
    #[serde(default)]
    pub truth_score: Option<Value>,
    #[serde(default)]
    pub score: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub claims: Option<Value>,
    #[serde(default)]
    pub overall_explanation: Option<Value>,
    #[serde(default)]
    pub explanation: Option<Value>,
    #[serde(default)]
    pub detailed_analysis: Option<Value>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub warnings: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl OracleReport {
    /// Parses the oracle's message content; anything but a JSON object is an error
    pub fn parse(content: &str) -> CoreResult<Self> {
        let value: Value = serde_json::from_str(content.trim()).map_err(|e| {
            CoreError::OracleError(format!("Oracle returned malformed JSON: {}", e))
        })?;
        if !value.is_object() {
            return Err(CoreError::OracleError(
                "Oracle response is not a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| {
            CoreError::OracleError(format!("Oracle response has unexpected shape: {}", e))
        })
    }

    /// Fills every field with its documented default
    pub fn normalize(self) -> NormalizedReport {
        let truth_score = self
            .truth_score
            .as_ref()
            .and_then(score_from_value)
            .or_else(|| self.score.as_ref().and_then(score_from_value))
            .unwrap_or(DEFAULT_TRUTH_SCORE);

        let status = self
            .status
            .as_ref()
            .and_then(non_empty_string)
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());

        let claims = match self.claims {
            Some(Value::Array(items)) => items.iter().filter_map(Claim::from_value).collect(),
            _ => Vec::new(),
        };

        let overall_explanation = self
            .overall_explanation
            .as_ref()
            .and_then(non_empty_string)
            .or_else(|| self.explanation.as_ref().and_then(non_empty_string))
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

        let detailed_analysis = self
            .detailed_analysis
            .as_ref()
            .and_then(non_empty_string)
            .or_else(|| self.details.as_ref().and_then(non_empty_string))
            .unwrap_or_default();

        let warnings = match self.warnings {
            Some(Value::Array(items)) => items.iter().filter_map(non_empty_string).collect(),
            Some(ref single) => non_empty_string(single).into_iter().collect(),
            None => Vec::new(),
        };

        let metadata = match self.metadata {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        NormalizedReport {
            truth_score,
            status,
            claims,
            overall_explanation,
            detailed_analysis,
            warnings,
            metadata,
        }
    }
}

// =============================================================================
// Normalized Report
// =============================================================================

/// A single factual claim extracted by the oracle
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub explanation: String,
    pub sources: Vec<String>,
}

impl Claim {
    /// Reads a claim from an object entry or a bare string; other shapes are dropped
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) if !text.trim().is_empty() => Some(Claim {
                text: text.trim().to_string(),
                ..Claim::default()
            }),
            Value::Object(obj) => {
                let field = |key: &str| obj.get(key).and_then(non_empty_string);
                let sources = match obj.get("sources") {
                    Some(Value::Array(items)) => {
                        items.iter().filter_map(non_empty_string).collect()
                    }
                    _ => Vec::new(),
                };
                Some(Claim {
                    text: field("text").unwrap_or_default(),
                    score: obj.get("score").and_then(score_from_value),
                    status: field("status"),
                    explanation: field("explanation").unwrap_or_default(),
                    sources,
                })
            }
            _ => None,
        }
    }

    /// Best short description: the explanation, else the claim text
    pub fn summary(&self) -> Option<&str> {
        if !self.explanation.is_empty() {
            Some(&self.explanation)
        } else if !self.text.is_empty() {
            Some(&self.text)
        } else {
            None
        }
    }
}

/// Oracle output with every field populated
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedReport {
    /// Truth score (0 - 100)
    pub truth_score: u8,
    /// Oracle status vocabulary, lower-cased (e.g. "partially-verified")
    pub status: String,
    pub claims: Vec<Claim>,
    pub overall_explanation: String,
    pub detailed_analysis: String,
    pub warnings: Vec<String>,
    pub metadata: Map<String, Value>,
}

// =============================================================================
// Helpers
// =============================================================================

fn non_empty_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Reads a 0-100 score from a number or numeric string, clamping and rounding
fn score_from_value(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

// =============================================================================
// Tests
// =============================================================================
