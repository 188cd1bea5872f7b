//! TruthGen Core Type Definitions
//!
//! Defines fundamental types used throughout the project.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{CoreError, CoreResult};

// =============================================================================
// ID Types
// =============================================================================

/// Request correlation identifier (ULID)
pub type RequestId = String;

/// Milliseconds since the Unix epoch
pub type EpochMillis = i64;

/// Returns the current time in epoch milliseconds
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

// =============================================================================
// Content Fingerprint
// =============================================================================

/// Length of a hex-encoded SHA-256 digest
pub const FINGERPRINT_LEN: usize = 64;

/// Deterministic SHA-256 digest of a submission's canonical content.
///
/// Always 64 lowercase hex characters, which also makes it safe to use as a
/// file name or primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Parses and validates a hex digest
    pub fn parse(value: &str) -> CoreResult<Self> {
        let valid = value.len() == FINGERPRINT_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(CoreError::InvalidFingerprint(format!(
                "expected {} lowercase hex characters, got {:?}",
                FINGERPRINT_LEN, value
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Wraps a digest already known to be valid
    pub(crate) fn from_digest_hex(hex: String) -> Self {
        debug_assert_eq!(hex.len(), FINGERPRINT_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentFingerprint {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentFingerprint> for String {
    fn from(value: ContentFingerprint) -> Self {
        value.0
    }
}
