//! Audio pipeline: device catalog, capture session, conditioning, encoding.

/// Microphone capture over a persistent cpal stream
pub mod capture;
/// Downmix and resample raw capture data to 16kHz mono
pub mod condition;
/// Input device enumeration
pub mod device;
/// WAV container encoding
pub mod wav;
