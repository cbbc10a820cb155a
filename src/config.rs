use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration, loaded from `~/.voicekey.toml`
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Capture settings
    pub audio: AudioConfig,
    /// Transcription endpoint settings
    pub transcription: TranscriptionConfig,
    /// Logging settings
    pub telemetry: TelemetryConfig,
}

/// Capture settings
#[derive(Debug, Deserialize, Clone)]
pub struct AudioConfig {
    /// Snapshot id of the preferred input device; `None` means system default
    pub device: Option<String>,
    /// Recordings shorter than this are discarded before encoding
    pub min_duration_secs: f64,
    /// Ring buffer capacity in seconds of native-rate audio
    pub max_recording_secs: usize,
}

/// Transcription endpoint settings
#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    /// Endpoint accepting multipart WAV uploads
    pub endpoint: String,
    /// Sampling temperature forwarded to the service
    pub temperature: f32,
    /// Hard timeout for the upload; a wedged call must not block the next
    /// recording forever
    pub timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Write logs to `log_path` instead of stdout
    pub enabled: bool,
    /// Log file location, `~` expanded
    pub log_path: String,
}

impl Config {
    /// Load config from `~/.voicekey.toml`, creating it with defaults first
    /// if missing.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default(&config_path).context("failed to create default config")?;
        }

        let contents = fs::read_to_string(&config_path).context("failed to read config file")?;

        let config: Self = toml::from_str(&contents).context("failed to parse config TOML")?;

        Ok(config)
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".voicekey.toml"))
    }

    fn create_default(path: &Path) -> Result<()> {
        let default_config = r#"[audio]
# device = "input-0-Built-in Microphone"   # omit for system default
min_duration_secs = 0.3
max_recording_secs = 30

[transcription]
endpoint = "http://localhost:9000/asr"
temperature = 0.0
timeout_secs = 30

[telemetry]
enabled = true
log_path = "~/.voicekey/voicekey.log"
"#;
        fs::write(path, default_config).context("failed to write default config")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_template_parses() {
        let parsed: Config = toml::from_str(
            r#"[audio]
min_duration_secs = 0.3
max_recording_secs = 30

[transcription]
endpoint = "http://localhost:9000/asr"
temperature = 0.0
timeout_secs = 30

[telemetry]
enabled = true
log_path = "~/.voicekey/voicekey.log"
"#,
        )
        .unwrap();

        assert_eq!(parsed.audio.device, None);
        assert!((parsed.audio.min_duration_secs - 0.3).abs() < f64::EPSILON);
        assert_eq!(parsed.transcription.endpoint, "http://localhost:9000/asr");
        assert_eq!(parsed.transcription.timeout_secs, 30);
    }

    #[test]
    fn test_device_override_is_optional() {
        let parsed: Config = toml::from_str(
            r#"[audio]
device = "input-1-USB Mic"
min_duration_secs = 0.5
max_recording_secs = 60

[transcription]
endpoint = "https://stt.example.com/asr"
temperature = 0.2
timeout_secs = 10

[telemetry]
enabled = false
log_path = ""
"#,
        )
        .unwrap();

        assert_eq!(parsed.audio.device.as_deref(), Some("input-1-USB Mic"));
        assert_eq!(parsed.audio.max_recording_secs, 60);
    }

    #[test]
    fn test_missing_section_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[audio]\nmin_duration_secs = 0.3\n");
        assert!(result.is_err());
    }
}
