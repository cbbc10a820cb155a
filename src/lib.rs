//! voicekey - push-to-talk voice transcription
//!
//! Captures microphone audio on a global Ctrl+Win chord, converts it to
//! 16kHz mono WAV and uploads it to a whisper-compatible HTTP endpoint.
//! This library exports the core modules for integration testing.

/// Audio capture, conditioning and encoding
pub mod audio;
/// Configuration management
pub mod config;
/// Recording state machine
pub mod controller;
/// Input handling (global hook, chord detection)
pub mod input;
/// Logging setup
pub mod telemetry;
/// Payload serialization and upload
pub mod transcription;
