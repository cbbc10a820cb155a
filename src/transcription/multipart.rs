//! multipart/form-data body construction.
//!
//! The transcription service parses the body strictly, so the framing here
//! follows RFC 2046 exactly: CRLF line endings, `--boundary` before each
//! part, `--boundary--` to terminate. Parts are appended in insertion order
//! and the binary audio part always goes first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Distinguishes boundaries created within one clock tick
static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Incrementally built multipart/form-data body
#[derive(Debug)]
pub struct MultipartBody {
    boundary: String,
    buf: Vec<u8>,
}

impl MultipartBody {
    /// Creates a body with a unique boundary
    #[must_use]
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::with_boundary(format!("----voicekey{nanos:x}{seq:x}"))
    }

    /// Creates a body with a fixed boundary (deterministic, used in tests)
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: Vec::new(),
        }
    }

    /// Appends a binary file part
    pub fn add_file_part(
        &mut self,
        name: &str,
        filename: &str,
        content_type: &str,
        bytes: &[u8],
    ) {
        self.buf
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
                .as_bytes(),
        );
        self.buf
            .extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        self.buf.extend_from_slice(bytes);
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Appends a plain text part
    pub fn add_text_part(&mut self, name: &str, value: &str) {
        self.buf
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.buf.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
    }

    /// Terminates the body and returns the Content-Type header value plus
    /// the serialized bytes
    #[must_use]
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.buf
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.buf,
        )
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_part_framing() {
        let mut body = MultipartBody::with_boundary("XBOUNDARY");
        body.add_text_part("temperature", "0.2");
        let (content_type, bytes) = body.finish();

        assert_eq!(content_type, "multipart/form-data; boundary=XBOUNDARY");
        let expected = "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"temperature\"\r\n\
             \r\n\
             0.2\r\n\
             --XBOUNDARY--\r\n";
        assert_eq!(bytes, expected.as_bytes());
    }

    #[test]
    fn test_file_part_carries_binary_payload_verbatim() {
        let audio = vec![0u8, 1, 2, 255, 254, 13, 10]; // includes CRLF bytes
        let mut body = MultipartBody::with_boundary("B");
        body.add_file_part("file", "audio.wav", "audio/wav", &audio);
        let (_, bytes) = body.finish();

        let header_end = b"audio/wav\r\n\r\n";
        let pos = bytes
            .windows(header_end.len())
            .position(|w| w == header_end)
            .unwrap()
            + header_end.len();
        assert_eq!(&bytes[pos..pos + audio.len()], audio.as_slice());
    }

    #[test]
    fn test_parts_keep_insertion_order() {
        let mut body = MultipartBody::with_boundary("B");
        body.add_file_part("file", "audio.wav", "audio/wav", b"RIFF");
        body.add_text_part("temperature", "0.0");
        body.add_text_part("response_format", "json");
        let (_, bytes) = body.finish();
        let text = String::from_utf8_lossy(&bytes);

        let file_pos = text.find("name=\"file\"").unwrap();
        let temp_pos = text.find("name=\"temperature\"").unwrap();
        let fmt_pos = text.find("name=\"response_format\"").unwrap();
        assert!(file_pos < temp_pos && temp_pos < fmt_pos);
    }

    #[test]
    fn test_body_ends_with_closing_boundary_marker() {
        let mut body = MultipartBody::with_boundary("END");
        body.add_text_part("a", "b");
        let (_, bytes) = body.finish();

        assert!(bytes.ends_with(b"--END--\r\n"));
    }

    #[test]
    fn test_generated_boundaries_are_unique_enough() {
        let a = MultipartBody::new();
        let b = MultipartBody::new();

        assert_ne!(a.boundary, b.boundary);
    }
}
