use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize logging.
///
/// Honors `RUST_LOG` for filtering (default `info`). With telemetry enabled
/// the subscriber appends to `log_path` (no ANSI); otherwise it writes to
/// stdout.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init(enabled: bool, log_path: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !enabled {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
        return Ok(());
    }

    let expanded_path = expand_log_path(log_path)?;

    if let Some(parent) = expanded_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&expanded_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file)
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!("telemetry initialized: {}", expanded_path.display());

    Ok(())
}

fn expand_log_path(path: &str) -> Result<PathBuf> {
    if let Some(stripped) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(stripped))
    } else {
        Ok(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_log_path_with_tilde() {
        let home = env::var("HOME").expect("HOME not set");
        let result = expand_log_path("~/logs/voicekey.log").unwrap();
        assert_eq!(result, PathBuf::from(home).join("logs/voicekey.log"));
    }

    #[test]
    fn test_expand_log_path_without_tilde() {
        let result = expand_log_path("/var/log/voicekey.log").unwrap();
        assert_eq!(result, PathBuf::from("/var/log/voicekey.log"));
    }

    #[test]
    fn test_expand_log_path_relative() {
        let result = expand_log_path("logs/voicekey.log").unwrap();
        assert_eq!(result, PathBuf::from("logs/voicekey.log"));
    }
}
