//! Request and response payloads for the HTTP entry point.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::core::analysis::{FileRef, Modality, Submission};
use crate::core::{CoreError, CoreResult};

/// Body of `POST /analyze`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    /// text | url | image | video | audio
    #[serde(rename = "type")]
    pub kind: String,
    /// Text, URL, or the file name for media
    #[serde(default)]
    pub content: String,
    /// Base64 file bytes, raw or as a `data:<mime>;base64,` URL
    #[serde(default)]
    pub file_data: Option<String>,
    /// Declared file size, used when no bytes are sent
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl AnalyzeRequest {
    /// Converts the wire payload into a submission
    pub fn into_submission(self) -> CoreResult<Submission> {
        let modality: Modality = self.kind.parse()?;

        match modality {
            Modality::Text => Ok(Submission::Text(self.content)),
            Modality::Url => Ok(Submission::Url(self.content)),
            media => {
                let mut file = FileRef::new(&self.content, self.file_size.unwrap_or(0));
                let mut mime_type = self.mime_type;

                if let Some(raw) = self.file_data.as_deref().filter(|d| !d.trim().is_empty()) {
                    let (data_mime, bytes) = decode_file_data(raw)?;
                    file = file.with_data(bytes);
                    mime_type = mime_type.or(data_mime);
                }
                if let Some(mime) = mime_type {
                    file = file.with_mime_type(&mime);
                }

                Submission::media(media, file)
            }
        }
    }
}

/// Decodes raw base64 or a base64 `data:` URL, returning the embedded MIME type
pub fn decode_file_data(raw: &str) -> CoreResult<(Option<String>, Vec<u8>)> {
    let raw = raw.trim();

    let (mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or_else(|| {
                CoreError::ValidationError("File data URL has no payload".to_string())
            })?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| {
                    CoreError::ValidationError("File data URL must be base64 encoded".to_string())
                })?
                .to_string();
            ((!mime.is_empty()).then_some(mime), payload)
        }
        None => (None, raw),
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|e| CoreError::ValidationError(format!("File data is not valid base64: {}", e)))?;
    Ok((mime, bytes))
}

/// Failure payload returned with HTTP 500
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub truth_score: u8,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            truth_score: 0,
            status: "error".to_string(),
        }
    }
}

impl From<&CoreError> for ErrorResponse {
    fn from(error: &CoreError) -> Self {
        Self::new(&error.user_message())
    }
}

/// Body of `GET /health`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub shared_cache: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str, content: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            kind: kind.to_string(),
            content: content.to_string(),
            ..AnalyzeRequest::default()
        }
    }

    #[test]
    fn test_text_and_url() {
        assert_eq!(
            request("text", "The Earth is flat").into_submission().unwrap(),
            Submission::text("The Earth is flat")
        );
        assert_eq!(
            request("url", "https://example.com").into_submission().unwrap(),
            Submission::url("https://example.com")
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = request("document", "x").into_submission().unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_media_with_declared_size() {
        let mut req = request("video", "clip.mp4");
        req.file_size = Some(4096);

        let sub = req.into_submission().unwrap();
        let file = sub.file().unwrap();
        assert_eq!(file.name, "clip.mp4");
        assert_eq!(file.size_bytes, 4096);
        assert!(file.data.is_none());
    }

    #[test]
    fn test_media_with_data_url() {
        let mut req = request("image", "photo.png");
        req.file_data = Some("data:image/png;base64,cG5n".to_string());
        req.file_size = Some(999);

        let sub = req.into_submission().unwrap();
        let file = sub.file().unwrap();
        assert_eq!(file.data.as_deref(), Some(&b"png"[..]));
        assert_eq!(file.size_bytes, 3);
        assert_eq!(file.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_raw_base64() {
        let (mime, bytes) = decode_file_data("aGVsbG8=").unwrap();
        assert!(mime.is_none());
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(decode_file_data("***").is_err());
        assert!(decode_file_data("data:image/png,plain").is_err());
        assert!(decode_file_data("data:image/png;base64").is_err());
    }

    #[test]
    fn test_error_payload_shape() {
        let json = serde_json::to_value(ErrorResponse::from(&CoreError::OracleError(
            "AI API error: 500".to_string(),
        )))
        .unwrap();

        assert_eq!(json["error"], "Could not analyze content. Please try again.");
        assert_eq!(json["truthScore"], 0);
        assert_eq!(json["status"], "error");
    }
}
