//! Recording state machine.
//!
//! All transitions run on one thread: the hook and audio callbacks only feed
//! data in through channels and the ring buffer, so the logic here never
//! races. Exactly one start→stop cycle is in flight at a time, and every
//! failure path degrades to "no transcript produced, ready for the next
//! attempt". Nothing in here terminates the process.

use tracing::{debug, info, warn};

use crate::audio::capture::CaptureControl;
use crate::audio::condition::{condition, TARGET_SAMPLE_RATE};
use crate::audio::wav::encode_wav;
use crate::input::chord::ChordAction;
use crate::transcription::TranscriptionService;

/// Externally visible recording state, handed to the tray/indicator
/// collaborators on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Waiting for the start chord
    Idle,
    /// Capture in flight
    Recording,
    /// Capture finished, payload being conditioned/encoded/uploaded
    Transcribing,
}

/// Seam to the excluded collaborators (tray, text injection).
///
/// They receive only the state enum and the final transcript; everything
/// else stays inside the core.
pub trait Observer {
    /// Recording state changed
    fn state_changed(&self, state: RecordingState);
    /// A transcript was produced; `confirm` distinguishes the
    /// release-triggered stop from the immediate alt stop
    fn transcript_ready(&self, text: &str, confirm: bool);
}

/// Drives one capture/condition/encode/upload cycle per chord stop.
///
/// Generic over its collaborators so the state machine is testable without
/// audio hardware or a live endpoint.
pub struct Controller<C, S, O> {
    capture: C,
    service: S,
    observer: O,
    min_duration_secs: f64,
    state: RecordingState,
}

impl<C, S, O> Controller<C, S, O>
where
    C: CaptureControl,
    S: TranscriptionService,
    O: Observer,
{
    /// Creates an idle controller
    pub const fn new(capture: C, service: S, observer: O, min_duration_secs: f64) -> Self {
        Self {
            capture,
            service,
            observer,
            min_duration_secs,
            state: RecordingState::Idle,
        }
    }

    /// Whether a capture cycle is currently in flight.
    ///
    /// This is the recording flag the chord detector is fed; the controller
    /// is the source of truth, not the detector.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> RecordingState {
        self.state
    }

    fn set_state(&mut self, state: RecordingState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "state transition");
            self.state = state;
            self.observer.state_changed(state);
        }
    }

    /// Applies one chord action. Actions that do not fit the current state
    /// are ignored, which makes redundant signals harmless.
    pub fn on_action(&mut self, action: ChordAction) {
        match action {
            ChordAction::Start => self.start(),
            ChordAction::StopConfirm => self.stop(true),
            ChordAction::StopPlain => self.stop(false),
        }
    }

    fn start(&mut self) {
        if self.state != RecordingState::Idle {
            debug!(state = ?self.state, "start ignored");
            return;
        }

        match self.capture.start_recording() {
            Ok(()) => {
                info!("recording started");
                self.set_state(RecordingState::Recording);
            }
            Err(e) => {
                warn!("failed to start recording: {e}");
            }
        }
    }

    fn stop(&mut self, confirm: bool) {
        if self.state != RecordingState::Recording {
            debug!(state = ?self.state, "stop ignored");
            return;
        }

        self.set_state(RecordingState::Transcribing);
        self.finish_cycle(confirm);
        self.set_state(RecordingState::Idle);
    }

    fn finish_cycle(&mut self, confirm: bool) {
        let raw = match self.capture.stop_recording() {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                warn!("no audio captured");
                return;
            }
            Err(e) => {
                warn!("failed to stop recording: {e}");
                return;
            }
        };

        let mono = match condition(&raw.samples, raw.channels, raw.sample_rate) {
            Ok(mono) => mono,
            Err(e) => {
                warn!("conditioning failed: {e}");
                return;
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let duration_secs = mono.len() as f64 / f64::from(TARGET_SAMPLE_RATE);
        if duration_secs < self.min_duration_secs {
            warn!(
                duration_secs,
                min = self.min_duration_secs,
                "recording too short, discarded"
            );
            return;
        }

        let payload = match encode_wav(&mono) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("encoding failed: {e}");
                return;
            }
        };

        info!(
            duration_secs,
            bytes = payload.wav_bytes.len(),
            "payload ready, uploading"
        );

        match self.service.transcribe(&payload) {
            Ok(text) if text.is_empty() => {
                warn!("transcription returned empty text");
            }
            Ok(text) => {
                info!(text_len = text.len(), "transcript ready");
                self.observer.transcript_ready(&text, confirm);
            }
            Err(e) => {
                warn!("transcription failed: {e}");
            }
        }
    }
}
