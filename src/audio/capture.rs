use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapRb,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::device;

/// Errors from the capture layer
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Neither the requested device nor the system default could be opened.
    /// No audio path is usable; fatal for this attempt.
    #[error("no usable input device: {source}")]
    DeviceUnavailable {
        /// Underlying open failure
        source: anyhow::Error,
    },

    /// A reinitialize was requested while a recording is in flight
    #[error("cannot switch device while recording")]
    ConcurrentReinitialize,

    /// Stream control (play/pause) failed
    #[error(transparent)]
    Stream(#[from] anyhow::Error),
}

/// Trait for controlling audio stream lifecycle
trait StreamControl {
    /// Resume audio stream (activate microphone)
    fn play(&self) -> Result<()>;
    /// Pause audio stream (deactivate microphone)
    fn pause(&self) -> Result<()>;
}

/// CPAL stream wrapper implementing `StreamControl`
struct CpalStreamControl {
    stream: cpal::Stream,
}

impl StreamControl for CpalStreamControl {
    fn play(&self) -> Result<()> {
        self.stream.play().context("failed to resume audio stream")
    }

    fn pause(&self) -> Result<()> {
        self.stream.pause().context("failed to pause audio stream")
    }
}

/// Raw samples drained after one recording, still in the device's native format
#[derive(Debug, Clone, PartialEq)]
pub struct RawCapture {
    /// Interleaved samples as delivered by the hardware callback
    pub samples: Vec<f32>,
    /// Native sample rate of the stream
    pub sample_rate: u32,
    /// Native channel count of the stream
    pub channels: u16,
}

/// Which device a capture session ended up bound to
#[derive(Debug, Clone)]
pub struct DeviceChoice {
    /// Snapshot id of the opened device
    pub id: String,
    /// Human-readable name of the opened device
    pub name: String,
    /// True if the requested device failed and the default was used instead
    pub fell_back: bool,
}

/// Recording control surface of a capture session.
///
/// Split out so the controller state machine can be tested against a fake
/// instead of real audio hardware.
pub trait CaptureControl {
    /// Begin retaining hardware-callback data. No-op while already recording.
    ///
    /// # Errors
    /// Returns error if the stream cannot be resumed.
    fn start_recording(&mut self) -> Result<(), CaptureError>;

    /// Stop retaining data and drain what was captured.
    ///
    /// Returns `None` if zero frames arrived or the stream died mid-flight.
    ///
    /// # Errors
    /// Returns error if the stream cannot be paused.
    fn stop_recording(&mut self) -> Result<Option<RawCapture>, CaptureError>;
}

/// Everything produced by opening one stream against one device
struct OpenedStream {
    stream_control: Box<dyn StreamControl>,
    ring_buffer_consumer: HeapCons<f32>,
    retain: Arc<AtomicBool>,
    stream_failed: Arc<AtomicBool>,
    native_sample_rate: u32,
    native_channels: u16,
}

fn open_stream(cpal_device: &cpal::Device, max_recording_secs: usize) -> Result<OpenedStream> {
    // Use the device's preferred configuration; forcing a rate invites
    // driver-side resampling artifacts or outright open failures
    let supported_config = cpal_device
        .default_input_config()
        .context("failed to get default input config")?;

    let native_sample_rate = supported_config.sample_rate();
    let native_channels = supported_config.channels();

    info!(
        rate = native_sample_rate,
        channels = native_channels,
        "native device config"
    );

    // Pre-size the ring buffer for the longest allowed recording so the
    // callback never allocates
    let capacity =
        (native_sample_rate as usize) * (native_channels as usize) * max_recording_secs;
    debug!(
        capacity,
        max_recording_secs, "ring buffer sized for max recording"
    );
    let (mut producer, ring_buffer_consumer) = HeapRb::<f32>::new(capacity).split();

    let retain = Arc::new(AtomicBool::new(false));
    let stream_failed = Arc::new(AtomicBool::new(false));

    let retain_cb = Arc::clone(&retain);
    let failed_cb = Arc::clone(&stream_failed);
    let stream_config = supported_config.into();
    let stream = cpal_device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if retain_cb.load(Ordering::Relaxed) {
                    // Lock-free push; the hardware callback must never block
                    let pushed = producer.push_slice(data);
                    if pushed < data.len() {
                        warn!("ring buffer full, dropped {} samples", data.len() - pushed);
                    }
                }
            },
            move |err| {
                warn!("audio stream error: {err}");
                failed_cb.store(true, Ordering::Relaxed);
            },
            None,
        )
        .context("failed to build input stream")?;

    let stream_control = CpalStreamControl { stream };

    // Start then immediately pause: the stream stays warm but the mic is
    // inactive until the start chord fires
    stream_control.play()?;
    stream_control.pause()?;

    Ok(OpenedStream {
        stream_control: Box::new(stream_control),
        ring_buffer_consumer,
        retain,
        stream_failed,
        native_sample_rate,
        native_channels,
    })
}

/// Microphone capture session over a persistent cpal stream.
///
/// The native stream is opened once at initialize time and left open; a
/// retain flag gates whether callback data is kept. Compared to opening and
/// closing the stream per utterance this removes stream-startup latency from
/// every recording, at the cost of holding the device open while idle (the
/// stream is paused between recordings, so the microphone is not capturing).
///
/// Exactly one session is live per process. The hardware callback is the
/// only writer into the ring buffer and the owning thread only drains it
/// after the stream is paused, so the two sides never race on a slot.
pub struct CaptureSession {
    /// Stream controller (kept alive to prevent stream drop)
    stream_control: Option<Box<dyn StreamControl>>,
    /// Ring buffer consumer for reading captured samples
    ring_buffer_consumer: HeapCons<f32>,
    /// Discard flag: callback retains data only while set
    retain: Arc<AtomicBool>,
    /// Set by the error callback when the stream dies (device unplugged)
    stream_failed: Arc<AtomicBool>,
    /// Native sample rate in Hz
    native_sample_rate: u32,
    /// Native channel count
    native_channels: u16,
    /// Ring buffer capacity in seconds, reused on reinitialize
    max_recording_secs: usize,
}

impl CaptureSession {
    /// Opens a capture session against the requested device.
    ///
    /// If `device_id` is given but fails to open, falls back once to the
    /// system default and reports it via [`DeviceChoice::fell_back`].
    ///
    /// # Errors
    /// Returns [`CaptureError::DeviceUnavailable`] when the default device
    /// also cannot be opened (no audio path is usable then).
    pub fn initialize(
        device_id: Option<&str>,
        max_recording_secs: usize,
    ) -> Result<(Self, DeviceChoice), CaptureError> {
        info!("initializing audio capture");

        let (opened, choice) = Self::open_with_fallback(device_id, max_recording_secs)?;

        info!(
            device = %choice.name,
            fell_back = choice.fell_back,
            "audio stream initialized (paused)"
        );

        Ok((
            Self {
                stream_control: Some(opened.stream_control),
                ring_buffer_consumer: opened.ring_buffer_consumer,
                retain: opened.retain,
                stream_failed: opened.stream_failed,
                native_sample_rate: opened.native_sample_rate,
                native_channels: opened.native_channels,
                max_recording_secs,
            },
            choice,
        ))
    }

    fn open_with_fallback(
        device_id: Option<&str>,
        max_recording_secs: usize,
    ) -> Result<(OpenedStream, DeviceChoice), CaptureError> {
        if let Some(wanted) = device_id {
            if let Some(cpal_device) = device::resolve(Some(wanted)) {
                match open_stream(&cpal_device, max_recording_secs) {
                    Ok(opened) => {
                        let name = cpal_device.name().unwrap_or_else(|_| "unknown".to_owned());
                        return Ok((
                            opened,
                            DeviceChoice {
                                id: wanted.to_owned(),
                                name,
                                fell_back: false,
                            },
                        ));
                    }
                    Err(e) => {
                        warn!(id = wanted, "requested device failed to open: {e}");
                    }
                }
            } else {
                warn!(id = wanted, "requested device not present");
            }
        }

        // Requested device unusable (or none requested): retry once against
        // the system default before giving up. Take the default's snapshot
        // entry so the reported id resolves against the same enumeration.
        let fallback = device::default_input_device()
            .map_err(|source| CaptureError::DeviceUnavailable { source })?;
        let default = device::resolve(Some(&fallback.id)).ok_or_else(|| {
            CaptureError::DeviceUnavailable {
                source: anyhow!("default input device vanished during open"),
            }
        })?;
        let opened = open_stream(&default, max_recording_secs)
            .map_err(|source| CaptureError::DeviceUnavailable { source })?;

        Ok((
            opened,
            DeviceChoice {
                id: fallback.id,
                name: fallback.name,
                fell_back: device_id.is_some(),
            },
        ))
    }

    /// Whether a recording is currently in flight
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.retain.load(Ordering::Relaxed)
    }

    /// Native sample rate of the open stream
    #[must_use]
    pub const fn native_sample_rate(&self) -> u32 {
        self.native_sample_rate
    }

    /// Native channel count of the open stream
    #[must_use]
    pub const fn native_channels(&self) -> u16 {
        self.native_channels
    }

    /// Tears down the current stream and opens a new one against `device_id`.
    ///
    /// The old stream is fully dropped before the new one is built so two
    /// native callbacks can never interleave appends into one buffer.
    ///
    /// # Errors
    /// Returns [`CaptureError::ConcurrentReinitialize`] while recording (no
    /// state change), or [`CaptureError::DeviceUnavailable`] if no device
    /// can be opened.
    pub fn reinitialize(&mut self, device_id: Option<&str>) -> Result<DeviceChoice, CaptureError> {
        if self.is_recording() {
            return Err(CaptureError::ConcurrentReinitialize);
        }

        info!(id = ?device_id, "reinitializing capture session");

        // Close-before-open: dropping the control tears the old stream down
        self.stream_control = None;

        let (opened, choice) = Self::open_with_fallback(device_id, self.max_recording_secs)?;
        self.stream_control = Some(opened.stream_control);
        self.ring_buffer_consumer = opened.ring_buffer_consumer;
        self.retain = opened.retain;
        self.stream_failed = opened.stream_failed;
        self.native_sample_rate = opened.native_sample_rate;
        self.native_channels = opened.native_channels;

        info!(device = %choice.name, "capture session reinitialized");
        Ok(choice)
    }
}

impl CaptureControl for CaptureSession {
    fn start_recording(&mut self) -> Result<(), CaptureError> {
        if self.is_recording() {
            debug!("start_recording while recording (no-op)");
            return Ok(());
        }

        let _span = tracing::debug_span!("start_recording").entered();
        let start = std::time::Instant::now();

        self.ring_buffer_consumer.clear();
        self.stream_failed.store(false, Ordering::Relaxed);

        // Retain flag goes up BEFORE the stream resumes so the first
        // callback after resume is already kept
        self.retain.store(true, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            if let Err(e) = stream_control.play() {
                // Roll the flag back; a raised flag over a dead stream reads
                // as a phantom recording that blocks start and reinitialize
                self.retain.store(false, Ordering::Relaxed);
                return Err(e.into());
            }
        }

        info!(latency_us = start.elapsed().as_micros(), "recording started");
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<Option<RawCapture>, CaptureError> {
        if !self.is_recording() {
            debug!("stop_recording while idle (no-op)");
            return Ok(None);
        }

        let _span = tracing::debug_span!("stop_recording").entered();

        // Flag flips first: callback data is discarded from here on, before
        // any buffer concatenation happens
        self.retain.store(false, Ordering::Relaxed);

        if let Some(stream_control) = &self.stream_control {
            stream_control.pause()?;
        }

        let start_drain = std::time::Instant::now();
        let mut samples = Vec::with_capacity(self.ring_buffer_consumer.occupied_len());
        while let Some(sample) = self.ring_buffer_consumer.try_pop() {
            samples.push(sample);
        }
        info!(
            samples = samples.len(),
            drain_us = start_drain.elapsed().as_micros(),
            "ring buffer drained"
        );

        if self.stream_failed.swap(false, Ordering::Relaxed) {
            warn!("stream failed mid-recording, capture cancelled");
            return Ok(None);
        }

        if samples.is_empty() {
            return Ok(None);
        }

        Ok(Some(RawCapture {
            samples,
            sample_rate: self.native_sample_rate,
            channels: self.native_channels,
        }))
    }
}
