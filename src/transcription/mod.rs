//! Transcription request serialization and upload.

/// HTTP client for the transcription endpoint
pub mod client;
/// multipart/form-data body builder
pub mod multipart;

pub use client::{HttpTranscriber, TranscriptionService, TransportError};
