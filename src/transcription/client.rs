use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::wav::TranscriptionPayload;
use crate::transcription::multipart::MultipartBody;

/// Errors from handing a payload to the transcription service
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS or timeout failure
    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-2xx status
    #[error("transcription service returned status {0}")]
    Status(u16),

    /// Response body was not the expected JSON shape
    #[error("malformed transcription response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Transcription backend seam.
///
/// The service is an external collaborator; this trait lets the controller
/// be tested against a mock instead of a live endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait TranscriptionService {
    /// Uploads the payload and returns the transcript text.
    ///
    /// # Errors
    /// Returns [`TransportError`] on network failure, non-2xx status, or a
    /// response that does not parse.
    fn transcribe(&self, payload: &TranscriptionPayload) -> Result<String, TransportError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP uploader posting WAV payloads to a whisper-compatible endpoint
pub struct HttpTranscriber {
    endpoint: String,
    temperature: f32,
    client: reqwest::blocking::Client,
}

impl HttpTranscriber {
    /// Creates a client with the caller-supplied request timeout.
    ///
    /// The timeout is mandatory: a wedged upload must not be able to stall
    /// the next recording attempt indefinitely.
    ///
    /// # Errors
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(endpoint: &str, temperature: f32, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_owned(),
            temperature,
            client,
        })
    }

    fn build_body(&self, payload: &TranscriptionPayload) -> (String, Vec<u8>) {
        let mut body = MultipartBody::new();
        body.add_file_part("file", "audio.wav", "audio/wav", &payload.wav_bytes);
        body.add_text_part("temperature", &format!("{:.1}", self.temperature));
        body.add_text_part("response_format", "json");
        body.finish()
    }
}

impl TranscriptionService for HttpTranscriber {
    fn transcribe(&self, payload: &TranscriptionPayload) -> Result<String, TransportError> {
        let _span = tracing::debug_span!(
            "transcribe",
            bytes = payload.wav_bytes.len(),
            duration_secs = payload.duration_secs()
        )
        .entered();

        let (content_type, body) = self.build_body(payload);
        debug!(endpoint = %self.endpoint, body_len = body.len(), "uploading payload");

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "transcription request rejected");
            return Err(TransportError::Status(status.as_u16()));
        }

        let text_body = response.text()?;
        let parsed: TranscriptionResponse = serde_json::from_str(&text_body)?;

        info!(
            text_len = parsed.text.len(),
            upload_ms = start.elapsed().as_millis(),
            "transcription completed"
        );

        Ok(parsed.text.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_of(bytes: Vec<u8>) -> TranscriptionPayload {
        TranscriptionPayload {
            wav_bytes: bytes,
            sample_rate: 16_000,
            channels: 1,
        }
    }

    #[test]
    fn test_body_contains_all_three_fields_in_order() {
        let transcriber =
            HttpTranscriber::new("http://localhost:9000/asr", 0.2, Duration::from_secs(30))
                .unwrap();

        let (content_type, body) = transcriber.build_body(&payload_of(b"RIFFdata".to_vec()));
        let text = String::from_utf8_lossy(&body);

        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let file_pos = text.find("name=\"file\"; filename=\"audio.wav\"").unwrap();
        let temp_pos = text.find("name=\"temperature\"").unwrap();
        let fmt_pos = text.find("name=\"response_format\"").unwrap();
        assert!(file_pos < temp_pos && temp_pos < fmt_pos);
        assert!(text.contains("Content-Type: audio/wav"));
        assert!(text.contains("0.2"));
        assert!(text.contains("json"));
    }

    #[test]
    fn test_temperature_rendered_as_decimal_string() {
        let transcriber =
            HttpTranscriber::new("http://localhost:9000/asr", 0.0, Duration::from_secs(30))
                .unwrap();

        let (_, body) = transcriber.build_body(&payload_of(vec![0]));
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("\r\n\r\n0.0\r\n"));
    }

    #[test]
    fn test_response_parsing_requires_text_field() {
        let ok: Result<TranscriptionResponse, _> = serde_json::from_str(r#"{"text":"hello"}"#);
        assert_eq!(ok.unwrap().text, "hello");

        let missing: Result<TranscriptionResponse, _> = serde_json::from_str(r#"{"result":"x"}"#);
        assert!(missing.is_err());

        let not_json: Result<TranscriptionResponse, _> = serde_json::from_str("<html>502</html>");
        assert!(not_json.is_err());
    }
}
