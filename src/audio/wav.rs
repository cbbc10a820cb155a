use anyhow::{Context, Result};
use hound::{WavSpec, WavWriter};
use std::io::Cursor;

use crate::audio::condition::TARGET_SAMPLE_RATE;

/// Bytes per encoded sample (16-bit PCM)
const BYTES_PER_SAMPLE: u32 = 2;

/// Encoded audio plus the metadata the transcription request needs.
///
/// Built once per stop event and consumed exactly once by the uploader.
#[derive(Debug, Clone)]
pub struct TranscriptionPayload {
    /// Complete WAV container (44-byte header + PCM data)
    pub wav_bytes: Vec<u8>,
    /// Sample rate declared in the header, always 16kHz at encode time
    pub sample_rate: u32,
    /// Channel count declared in the header, always mono
    pub channels: u16,
}

impl TranscriptionPayload {
    /// Audio duration derived from the data-chunk length
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        let data_len = self.wav_bytes.len().saturating_sub(44);
        #[allow(clippy::cast_precision_loss)]
        {
            data_len as f64
                / (f64::from(self.sample_rate) * f64::from(self.channels) * f64::from(BYTES_PER_SAMPLE))
        }
    }
}

/// Converts a float sample to 16-bit PCM.
///
/// Clamps to [-1, 1] first, then scales with the asymmetric factors of the
/// i16 range (32767 positive, 32768 negative) so full-scale input uses the
/// full symmetric swing without overflow.
#[allow(clippy::cast_possible_truncation)]
fn to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped >= 0.0 {
        (f64::from(clamped) * 32767.0) as i16
    } else {
        (f64::from(clamped) * 32768.0) as i16
    }
}

/// Encodes 16kHz mono samples into a WAV container.
///
/// The header's declared chunk sizes exactly match the payload: the
/// transcription service parses the container strictly, so a mismatched
/// length is a hard failure, not a cosmetic one.
///
/// # Errors
/// Returns error if the in-memory writer fails (header finalization).
pub fn encode_wav(samples: &[f32]) -> Result<TranscriptionPayload> {
    let _span = tracing::debug_span!("encode_wav", samples = samples.len()).entered();

    let spec = WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).context("failed to start WAV container")?;
        for &sample in samples {
            writer
                .write_sample(to_i16(sample))
                .context("failed to write sample")?;
        }
        writer.finalize().context("failed to finalize WAV header")?;
    }

    let wav_bytes = cursor.into_inner();
    tracing::debug!(bytes = wav_bytes.len(), "WAV container encoded");

    Ok(TranscriptionPayload {
        wav_bytes,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_u32(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    fn header_u16(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    #[test]
    fn test_declared_data_length_matches_payload() {
        let samples = vec![0.25_f32; 1234];

        let payload = encode_wav(&samples).unwrap();
        let bytes = &payload.wav_bytes;

        assert_eq!(bytes.len(), 44 + 1234 * 2);
        // RIFF chunk size at offset 4 covers everything after it
        assert_eq!(header_u32(bytes, 4) as usize, bytes.len() - 8);
        // data chunk size at offset 40 is the exact PCM length
        assert_eq!(header_u32(bytes, 40) as usize, bytes.len() - 44);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_sine_round_trip_recovers_format() {
        // 1 second of 440Hz at 16kHz
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * (i as f32) / 16_000.0).sin())
            .collect();

        let payload = encode_wav(&samples).unwrap();
        let bytes = &payload.wav_bytes;

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(header_u16(bytes, 22), 1, "channels");
        assert_eq!(header_u32(bytes, 24), 16_000, "sample rate");
        assert_eq!(header_u16(bytes, 34), 16, "bits per sample");
        assert_eq!(header_u32(bytes, 40), 32_000, "data length");

        let reader = hound::WavReader::new(std::io::Cursor::new(bytes.clone())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len(), 16_000);
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        let samples = vec![2.5, -3.0];

        let payload = encode_wav(&samples).unwrap();
        let mut reader =
            hound::WavReader::new(std::io::Cursor::new(payload.wav_bytes)).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();

        assert_eq!(decoded, vec![32767, -32768]);
    }

    #[test]
    fn test_asymmetric_scale_uses_full_range() {
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(-1.0), -32768);
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(0.5), 16383);
        assert_eq!(to_i16(-0.5), -16384);
    }

    #[test]
    fn test_empty_capture_still_produces_valid_header() {
        let payload = encode_wav(&[]).unwrap();

        assert_eq!(payload.wav_bytes.len(), 44);
        assert_eq!(header_u32(&payload.wav_bytes, 40), 0);
    }

    #[test]
    fn test_duration_derived_from_data_length() {
        let samples = vec![0.0_f32; 4800]; // 0.3s at 16kHz

        let payload = encode_wav(&samples).unwrap();

        assert!((payload.duration_secs() - 0.3).abs() < 1e-9);
    }
}
