//! Content Identifier
//!
//! Derives the cache key for a submission.

use sha2::{Digest, Sha256};

use crate::core::ContentFingerprint;

use super::Submission;

/// Computes deterministic SHA-256 fingerprints for submissions.
///
/// Text and URLs hash their raw string. Files hash `name + byte size`, not
/// their bytes: two different files sharing a name and size collide.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContentIdentifier;

impl ContentIdentifier {
    pub fn new() -> Self {
        Self
    }

    /// Returns the canonical string that gets hashed
    pub fn canonical_form(submission: &Submission) -> String {
        match submission {
            Submission::Text(s) | Submission::Url(s) => s.clone(),
            Submission::Image(f) | Submission::Video(f) | Submission::Audio(f) => {
                format!("{}{}", f.name, f.size_bytes)
            }
        }
    }

    /// Fingerprints a submission
    pub fn fingerprint(&self, submission: &Submission) -> ContentFingerprint {
        sha256_hex(&Self::canonical_form(submission))
    }
}

/// SHA-256 of a UTF-8 string as lowercase hex
pub fn sha256_hex(input: &str) -> ContentFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    ContentFingerprint::from_digest_hex(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::FileRef;

    #[test]
    fn test_known_digest() {
        let fp = sha256_hex("hello");
        assert_eq!(
            fp.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_identical_text_yields_identical_fingerprint() {
        let id = ContentIdentifier::new();
        let a = id.fingerprint(&Submission::text("The Earth is flat"));
        let b = id.fingerprint(&Submission::text("The Earth is flat"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_different_text_yields_different_fingerprint() {
        let id = ContentIdentifier::new();
        let a = id.fingerprint(&Submission::text("The Earth is flat"));
        let b = id.fingerprint(&Submission::text("The Earth is round"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_fingerprint_uses_name_and_size() {
        let id = ContentIdentifier::new();
        let sub = Submission::Image(FileRef::new("photo.jpg", 2048));
        assert_eq!(ContentIdentifier::canonical_form(&sub), "photo.jpg2048");
        assert_eq!(id.fingerprint(&sub), sha256_hex("photo.jpg2048"));
    }

    #[test]
    fn test_file_fingerprint_ignores_bytes() {
        let id = ContentIdentifier::new();
        let a = Submission::Image(FileRef::new("photo.jpg", 0).with_data(vec![1, 2, 3]));
        let b = Submission::Image(FileRef::new("photo.jpg", 0).with_data(vec![9, 9, 9]));
        assert_eq!(id.fingerprint(&a), id.fingerprint(&b));
    }

    #[test]
    fn test_file_fingerprint_changes_with_size() {
        let id = ContentIdentifier::new();
        let a = Submission::Video(FileRef::new("clip.mp4", 100));
        let b = Submission::Video(FileRef::new("clip.mp4", 101));
        assert_ne!(id.fingerprint(&a), id.fingerprint(&b));
    }
}
