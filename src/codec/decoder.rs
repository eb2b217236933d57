//! Opus decoder wrapper
//!
//! Decodes packets to 16-bit PCM and synthesizes concealment audio for lost
//! packets by feeding the codec an empty input.

use opus::{Channels, Decoder};

use crate::error::CodecError;

/// Opus decoder pinned to one rate and channel count
pub struct AudioDecoder {
    decoder: Decoder,
    sample_rate: u32,
    channels: u8,
    /// Samples per 10 ms frame, per channel
    frame_samples: usize,
    /// Decoding buffer (reused to avoid allocations), sized for the longest
    /// legal Opus frame (120 ms)
    decode_buffer: Vec<i16>,
    frames_decoded: u64,
    frames_concealed: u64,
    samples_produced: u64,
}

impl AudioDecoder {
    pub fn new(sample_rate: u32, channels: u8) -> Result<Self, CodecError> {
        let opus_channels = match channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            _ => {
                return Err(CodecError::DecoderInit(format!(
                    "Unsupported channel count: {channels}"
                )))
            }
        };

        let decoder = Decoder::new(sample_rate, opus_channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        let max_samples = (sample_rate as usize * 120 / 1000) * channels as usize;

        Ok(Self {
            decoder,
            sample_rate,
            channels,
            frame_samples: (sample_rate / 100) as usize,
            decode_buffer: vec![0i16; max_samples],
            frames_decoded: 0,
            frames_concealed: 0,
            samples_produced: 0,
        })
    }

    /// Decode one packet payload, or pass `None` (or zero-length input) for a
    /// lost packet to invoke the codec's loss concealment. Returns
    /// interleaved i16 samples.
    pub fn decode(&mut self, payload: Option<&[u8]>) -> Result<Vec<i16>, CodecError> {
        match payload {
            Some(data) if !data.is_empty() => {
                let per_channel = self
                    .decoder
                    .decode(data, &mut self.decode_buffer, false)
                    .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;
                self.frames_decoded += 1;
                Ok(self.take(per_channel))
            }
            _ => {
                // Concealment output length is chosen by the caller through
                // the buffer size; one nominal frame keeps timing intact.
                let want = self.frame_samples * self.channels as usize;
                let buf = &mut self.decode_buffer[..want];
                let per_channel = self
                    .decoder
                    .decode(&[], buf, false)
                    .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;
                self.frames_concealed += 1;
                Ok(self.take(per_channel))
            }
        }
    }

    fn take(&mut self, per_channel: usize) -> Vec<i16> {
        let total = per_channel * self.channels as usize;
        self.samples_produced += total as u64;
        self.decode_buffer[..total].to_vec()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Samples per frame, per channel
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Get statistics
    pub fn stats(&self) -> DecoderStats {
        DecoderStats {
            frames_decoded: self.frames_decoded,
            frames_concealed: self.frames_concealed,
            samples_produced: self.samples_produced,
        }
    }
}

/// Decoder statistics
#[derive(Debug, Clone)]
pub struct DecoderStats {
    pub frames_decoded: u64,
    pub frames_concealed: u64,
    pub samples_produced: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleFormat;
    use crate::codec::{AudioEncoder, EncodeOutcome};

    #[test]
    fn test_decoder_creation() {
        assert!(AudioDecoder::new(24000, 1).is_ok());
        assert!(AudioDecoder::new(48000, 2).is_ok());
        assert!(AudioDecoder::new(48000, 5).is_err());
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let mut encoder = AudioEncoder::new(48000, 1, SampleFormat::I16).unwrap();
        let mut decoder = AudioDecoder::new(48000, 1).unwrap();

        let samples: Vec<i16> = (0..encoder.samples_per_frame())
            .map(|i| {
                let t = i as f32 / 48000.0;
                ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0) as i16
            })
            .collect();

        let payload = match encoder.encode_i16(&samples).unwrap() {
            EncodeOutcome::Packet(p) => p,
            EncodeOutcome::EndOfStream => panic!("full frame must encode"),
        };

        let decoded = decoder.decode(Some(&payload)).unwrap();
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn test_concealment_produces_one_frame() {
        let mut decoder = AudioDecoder::new(24000, 1).unwrap();

        let concealed = decoder.decode(None).unwrap();
        assert_eq!(concealed.len(), 240);

        let stats = decoder.stats();
        assert_eq!(stats.frames_concealed, 1);
        assert_eq!(stats.frames_decoded, 0);
    }
}
