use anyhow::Result;
use std::time::Duration;

use voicekey::audio::capture::CaptureSession;
use voicekey::audio::device;
use voicekey::config::Config;
use voicekey::controller::{Controller, Observer, RecordingState};
use voicekey::input::chord::ChordDetector;
use voicekey::input::hook;
use voicekey::telemetry;
use voicekey::transcription::HttpTranscriber;

/// Default observer: logs state transitions and prints transcripts.
///
/// The tray and text-injection collaborators plug in here.
struct ConsoleObserver;

impl Observer for ConsoleObserver {
    fn state_changed(&self, state: RecordingState) {
        tracing::info!(?state, "recording state");
    }

    fn transcript_ready(&self, text: &str, confirm: bool) {
        tracing::info!(confirm, "transcript");
        println!("{text}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path)?;
    tracing::info!("voicekey starting");

    match device::list_input_devices() {
        Ok(devices) => {
            for d in &devices {
                tracing::info!(
                    id = %d.id,
                    default = d.is_default_input,
                    "input device: {}", d.name
                );
            }
        }
        Err(e) => tracing::warn!("device enumeration failed: {e}"),
    }

    let (session, choice) =
        CaptureSession::initialize(config.audio.device.as_deref(), config.audio.max_recording_secs)?;
    if choice.fell_back {
        tracing::warn!(
            requested = ?config.audio.device,
            actual = %choice.name,
            "requested device unavailable, using default"
        );
    }
    println!("✓ Capture ready on: {}", choice.name);

    let service = HttpTranscriber::new(
        &config.transcription.endpoint,
        config.transcription.temperature,
        Duration::from_secs(config.transcription.timeout_secs),
    )?;
    println!("✓ Transcription endpoint: {}", config.transcription.endpoint);

    let mut controller = Controller::new(
        session,
        service,
        ConsoleObserver,
        config.audio.min_duration_secs,
    );
    let mut detector = ChordDetector::new();

    let keys = hook::spawn();
    println!("\nvoicekey is running.");
    println!("  Ctrl+Win      start recording");
    println!("  release Ctrl  stop and transcribe");
    println!("  Alt           stop without confirmation");
    println!("Press Ctrl+C to exit.\n");

    tracing::info!("event loop starting");
    loop {
        // Drain pending key events into the single-threaded state machine
        while let Ok(event) = keys.try_recv() {
            if let Some(action) = detector.handle(event, controller.is_recording()) {
                controller.on_action(action);
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
            () = tokio::time::sleep(tokio::time::Duration::from_millis(10)) => {
                // Poll interval (10ms to avoid busy-waiting)
            }
        }
    }

    Ok(())
}
