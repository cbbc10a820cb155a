use thiserror::Error;
use tracing::{debug, info};

/// Fixed output rate expected by the transcription service.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Errors from conditioning raw capture data
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// Channel layout the downmixer does not support
    #[error("unsupported channel count: {0} (only mono and stereo input is handled)")]
    UnsupportedChannels(u16),
}

/// Converts raw interleaved capture data to 16kHz mono.
///
/// Downmixes by averaging the interleaved channels of each frame, then
/// resamples to [`TARGET_SAMPLE_RATE`] with linear interpolation. Input is
/// expected in the native capture range [-1.0, 1.0]; output stays in range
/// because both steps are convex combinations of input samples.
///
/// # Errors
/// Returns [`ConditionError::UnsupportedChannels`] for zero channels or more
/// than two; truncating surround layouts silently would corrupt speech audio.
pub fn condition(
    samples: &[f32],
    channels: u16,
    native_rate: u32,
) -> Result<Vec<f32>, ConditionError> {
    let _span = tracing::debug_span!("condition", channels, native_rate).entered();

    if channels == 0 || channels > 2 {
        return Err(ConditionError::UnsupportedChannels(channels));
    }

    let start_downmix = std::time::Instant::now();
    let mono = downmix(samples, channels);
    if channels > 1 {
        debug!(
            channels,
            downmix_us = start_downmix.elapsed().as_micros(),
            "downmixed to mono"
        );
    }

    if native_rate == TARGET_SAMPLE_RATE {
        return Ok(mono);
    }

    let start_resample = std::time::Instant::now();
    let resampled = resample_linear(&mono, native_rate, TARGET_SAMPLE_RATE);
    info!(
        native_rate,
        target_rate = TARGET_SAMPLE_RATE,
        input_samples = mono.len(),
        output_samples = resampled.len(),
        resample_us = start_resample.elapsed().as_micros(),
        "resampling completed"
    );

    Ok(resampled)
}

fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }

    let channels_f64 = f64::from(channels);
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&s| f64::from(s)).sum();
            // f64 → f32: audio samples are stored as f32, precision sufficient
            #[allow(clippy::cast_possible_truncation)]
            {
                (sum / channels_f64) as f32
            }
        })
        .collect()
}

/// Linear-interpolation resampler. Deliberately not a windowed-sinc filter:
/// speech transcription tolerates the aliasing at typical 44.1/48kHz → 16kHz
/// ratios, and this keeps the post-stop latency flat.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn resample_linear(mono: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if mono.is_empty() {
        return Vec::new();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = ((mono.len() as f64) / ratio).ceil() as usize;

    let last = mono.len() - 1;
    let mut out = Vec::with_capacity(output_len);
    for i in 0..output_len {
        let src_pos = (i as f64) * ratio;
        // Clamp both taps so the final output sample never reads past the end
        let floor_idx = (src_pos.floor() as usize).min(last);
        let ceil_idx = (floor_idx + 1).min(last);
        let fract = src_pos - src_pos.floor();

        let s1 = f64::from(mono[floor_idx]);
        let s2 = f64::from(mono[ceil_idx]);
        out.push(s1.mul_add(1.0 - fract, s2 * fract) as f32);
    }

    out
}

#[cfg(test)]
#[allow(clippy::float_cmp)] // Test assertions with known exact values
mod tests {
    use super::*;

    #[test]
    fn test_stereo_downmix_averages_channels() {
        // Stereo frames: [L1, R1, L2, R2, L3, R3]
        let stereo = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let result = condition(&stereo, 2, 16_000).unwrap();

        assert_eq!(result, vec![1.5, 3.5, 5.5]);
    }

    #[test]
    fn test_opposite_phase_stereo_cancels_to_silence() {
        // left = -right must downmix to exact zero
        let stereo = vec![0.5, -0.5, -0.25, 0.25, 1.0, -1.0];

        let result = condition(&stereo, 2, 16_000).unwrap();

        assert_eq!(result, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_mono_at_target_rate_passes_through() {
        let mono = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let result = condition(&mono, 1, 16_000).unwrap();

        assert_eq!(result, mono);
    }

    #[test]
    fn test_constant_signal_survives_any_ratio() {
        for rate in [8_000, 22_050, 44_100, 48_000, 96_000] {
            let samples = vec![0.42_f32; 500];
            let result = condition(&samples, 1, rate).unwrap();

            assert!(!result.is_empty());
            for &s in &result {
                assert_eq!(s, 0.42, "rate {rate} broke constant-signal identity");
            }
        }
    }

    #[test]
    fn test_downsampling_48khz_sample_count() {
        // 3:1 ratio, 9 samples -> 3 samples
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];

        let result = condition(&samples, 1, 48_000).unwrap();

        assert_eq!(result.len(), 3);
        for &s in &result {
            assert!((1.0..=9.0).contains(&s));
        }
    }

    #[test]
    fn test_upsampling_8khz_interpolates_between_samples() {
        // 1:2 ratio, 4 samples -> 8 samples
        let samples = vec![1.0, 2.0, 3.0, 4.0];

        let result = condition(&samples, 1, 8_000).unwrap();

        assert_eq!(result.len(), 8);
        // Even indices land exactly on source samples
        assert_eq!(result[0], 1.0);
        assert_eq!(result[2], 2.0);
        assert_eq!(result[4], 3.0);
        // Odd indices sit halfway between neighbours
        assert_eq!(result[1], 1.5);
        assert_eq!(result[3], 2.5);
    }

    #[test]
    fn test_final_sample_clamps_instead_of_overreading() {
        let samples = vec![0.0, 1.0];

        // Upsampling pushes the last output positions past the final source
        // sample; they must clamp to it rather than read out of bounds
        let result = condition(&samples, 1, 8_000).unwrap();

        assert_eq!(result.len(), 4);
        assert_eq!(*result.last().unwrap(), 1.0);
    }

    #[test]
    fn test_resampling_preserves_amplitude_bounds() {
        let samples = vec![-1.0, -0.5, 0.0, 0.5, 1.0];

        let result = condition(&samples, 1, 22_050).unwrap();

        for &s in &result {
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_surround_input_fails_loudly() {
        let samples = vec![0.0; 24];

        let err = condition(&samples, 6, 48_000).unwrap_err();

        assert_eq!(err, ConditionError::UnsupportedChannels(6));
    }

    #[test]
    fn test_zero_channels_rejected() {
        let err = condition(&[], 0, 48_000).unwrap_err();

        assert_eq!(err, ConditionError::UnsupportedChannels(0));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        let result = condition(&[], 2, 44_100).unwrap();

        assert!(result.is_empty());
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_sample_count_tracks_rate_ratio() {
        let samples = vec![0.0; 20];

        let down = condition(&samples, 1, 32_000).unwrap();
        assert!((down.len() as f32 - 10.0).abs() < 2.0);

        let up = condition(&samples, 1, 8_000).unwrap();
        assert!((up.len() as f32 - 40.0).abs() < 2.0);
    }
}
