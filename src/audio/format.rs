//! Sample and stream format model
//!
//! A session is pinned to one sample format and channel count at setup;
//! anything the pipeline cannot carry is rejected before capture starts.

use crate::constants::{FRAME_DURATION_MS, MAX_CHANNELS};
use crate::error::AudioError;

/// Raw sample encoding of the capture stream. The two variants are mutually
/// exclusive per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 32-bit IEEE float, little-endian
    F32,
    /// 16-bit signed integer, little-endian
    I16,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::F32 => 4,
            SampleFormat::I16 => 2,
        }
    }
}

/// Negotiated capture stream format
#[derive(Debug, Clone, Copy)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub sample_format: SampleFormat,
}

impl StreamFormat {
    pub fn new(sample_rate: u32, channels: u8, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /// Setup-time validation. Runs once before any stream is opened.
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} channels (supported: 1 or 2)",
                self.channels
            )));
        }
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} Hz sample rate",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Samples per 10 ms frame, per channel
    pub fn frame_samples(&self) -> usize {
        (self.sample_rate / (1000 / FRAME_DURATION_MS)) as usize
    }

    /// Byte length of one 10 ms frame.
    ///
    /// Invariant: always frame_samples * channels * bytes_per_sample.
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples() * self.channels as usize * self.sample_format.bytes_per_sample()
    }
}

/// Reinterpret little-endian frame bytes as i16 samples
pub fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

/// Reinterpret little-endian frame bytes as f32 samples
pub fn bytes_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Serialize i16 samples to little-endian bytes
pub fn i16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Serialize f32 samples to little-endian bytes
pub fn f32_to_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes_invariant() {
        let fmt = StreamFormat::new(48000, 2, SampleFormat::F32);
        assert_eq!(fmt.frame_samples(), 480);
        assert_eq!(fmt.frame_bytes(), 480 * 2 * 4);

        let fmt = StreamFormat::new(24000, 1, SampleFormat::I16);
        assert_eq!(fmt.frame_samples(), 240);
        assert_eq!(fmt.frame_bytes(), 240 * 2);
    }

    #[test]
    fn test_rejects_unsupported_channel_count() {
        let fmt = StreamFormat::new(48000, 3, SampleFormat::F32);
        assert!(matches!(
            fmt.validate(),
            Err(AudioError::UnsupportedFormat(_))
        ));

        let fmt = StreamFormat::new(48000, 0, SampleFormat::I16);
        assert!(fmt.validate().is_err());
    }

    #[test]
    fn test_sample_byte_round_trip() {
        let samples = vec![0i16, -1, 32767, -32768, 1234];
        assert_eq!(bytes_to_i16(&i16_to_bytes(&samples)), samples);

        let samples = vec![0.0f32, -1.0, 0.5, 0.25];
        assert_eq!(bytes_to_f32(&f32_to_bytes(&samples)), samples);
    }
}
