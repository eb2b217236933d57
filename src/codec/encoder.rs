//! Opus encoder wrapper
//!
//! Wraps the raw codec with the session's fixed-frame policy: full frames
//! must encode, a failing sub-frame tail ends the stream instead of erroring.

use bytes::Bytes;
use opus::{Application, Channels, Encoder};

use crate::audio::format::{bytes_to_f32, bytes_to_i16, SampleFormat};
use crate::constants::MAX_OPUS_PAYLOAD;
use crate::error::CodecError;

/// Result of encoding one frame
#[derive(Debug)]
pub enum EncodeOutcome {
    /// One compressed frame
    Packet(Bytes),
    /// The input was a tail fragment the codec would not take; the stream is
    /// over and the fragment is dropped.
    EndOfStream,
}

/// Opus encoder pinned to one rate/channel-count/format for its lifetime
pub struct AudioEncoder {
    encoder: Encoder,
    sample_rate: u32,
    channels: u8,
    sample_format: SampleFormat,
    /// Samples per 10 ms frame, per channel
    frame_samples: usize,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
    frames_encoded: u64,
    bytes_produced: u64,
}

impl AudioEncoder {
    /// Create an encoder. `sample_rate` must be a codec tier rate and
    /// `channels` mono or stereo; violations are setup-time errors.
    pub fn new(
        sample_rate: u32,
        channels: u8,
        sample_format: SampleFormat,
    ) -> Result<Self, CodecError> {
        let opus_channels = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(CodecError::EncoderInit(format!(
                    "Unsupported channel count: {channels}"
                )))
            }
        };

        let encoder = Encoder::new(sample_rate, opus_channels, Application::Voip)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        Ok(Self {
            encoder,
            sample_rate,
            channels,
            sample_format,
            frame_samples: (sample_rate / 100) as usize,
            encode_buffer: vec![0u8; MAX_OPUS_PAYLOAD],
            frames_encoded: 0,
            bytes_produced: 0,
        })
    }

    /// Encode one frame of raw little-endian bytes in the session's sample
    /// format. Interleaved when stereo.
    pub fn encode_bytes(&mut self, frame: &[u8]) -> Result<EncodeOutcome, CodecError> {
        match self.sample_format {
            SampleFormat::F32 => {
                let samples = bytes_to_f32(frame);
                self.encode_f32(&samples)
            }
            SampleFormat::I16 => {
                let samples = bytes_to_i16(frame);
                self.encode_i16(&samples)
            }
        }
    }

    /// Encode one frame of interleaved f32 samples
    pub fn encode_f32(&mut self, samples: &[f32]) -> Result<EncodeOutcome, CodecError> {
        let per_channel = samples.len() / self.channels as usize;
        match self.encoder.encode_float(samples, &mut self.encode_buffer) {
            Ok(size) => Ok(self.emit(size)),
            Err(e) => self.classify_failure(per_channel, e),
        }
    }

    /// Encode one frame of interleaved i16 samples
    pub fn encode_i16(&mut self, samples: &[i16]) -> Result<EncodeOutcome, CodecError> {
        let per_channel = samples.len() / self.channels as usize;
        match self.encoder.encode(samples, &mut self.encode_buffer) {
            Ok(size) => Ok(self.emit(size)),
            Err(e) => self.classify_failure(per_channel, e),
        }
    }

    fn emit(&mut self, size: usize) -> EncodeOutcome {
        self.frames_encoded += 1;
        self.bytes_produced += size as u64;
        EncodeOutcome::Packet(Bytes::copy_from_slice(&self.encode_buffer[..size]))
    }

    /// A failing frame shorter than the canonical size is the stream tail;
    /// anything else is fatal.
    fn classify_failure(
        &self,
        per_channel: usize,
        err: opus::Error,
    ) -> Result<EncodeOutcome, CodecError> {
        if per_channel < self.frame_samples {
            Ok(EncodeOutcome::EndOfStream)
        } else {
            Err(CodecError::EncodingFailed(err.to_string()))
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Samples per frame, per channel
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Total samples per frame across channels
    pub fn samples_per_frame(&self) -> usize {
        self.frame_samples * self.channels as usize
    }

    /// Get statistics
    pub fn stats(&self) -> EncoderStats {
        EncoderStats {
            frames_encoded: self.frames_encoded,
            bytes_produced: self.bytes_produced,
        }
    }
}

/// Encoder statistics
#[derive(Debug, Clone)]
pub struct EncoderStats {
    pub frames_encoded: u64,
    pub bytes_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoder_creation() {
        let encoder = AudioEncoder::new(48000, 1, SampleFormat::I16);
        assert!(encoder.is_ok());
        let encoder = encoder.unwrap();
        assert_eq!(encoder.frame_samples(), 480);

        // Off-tier rates are rejected by the codec itself.
        assert!(AudioEncoder::new(44100, 1, SampleFormat::I16).is_err());
        assert!(AudioEncoder::new(48000, 3, SampleFormat::I16).is_err());
    }

    #[test]
    fn test_full_frame_encodes() {
        let mut encoder = AudioEncoder::new(24000, 1, SampleFormat::I16).unwrap();
        let samples = vec![0i16; encoder.samples_per_frame()];

        match encoder.encode_i16(&samples).unwrap() {
            EncodeOutcome::Packet(payload) => assert!(!payload.is_empty()),
            EncodeOutcome::EndOfStream => panic!("full frame must encode"),
        }
        assert_eq!(encoder.stats().frames_encoded, 1);
    }

    #[test]
    fn test_tail_fragment_is_end_of_stream() {
        let mut encoder = AudioEncoder::new(24000, 1, SampleFormat::I16).unwrap();
        // 7 ms is not an acceptable Opus frame duration.
        let tail = vec![0i16; 168];

        match encoder.encode_i16(&tail).unwrap() {
            EncodeOutcome::EndOfStream => {}
            EncodeOutcome::Packet(_) => panic!("tail fragment must end the stream"),
        }
        assert_eq!(encoder.stats().frames_encoded, 0);
    }

    #[test]
    fn test_bytes_entry_point() {
        let mut encoder = AudioEncoder::new(48000, 2, SampleFormat::F32).unwrap();
        let frame = vec![0u8; 480 * 2 * 4];
        assert!(matches!(
            encoder.encode_bytes(&frame).unwrap(),
            EncodeOutcome::Packet(_)
        ));
    }
}
