//! Sample-rate bridging
//!
//! Capture devices run at whatever rate the OS mixer negotiated; the codec
//! only accepts the tier rates in [`crate::constants::CODEC_SAMPLE_RATES`].
//! [`RateAdapter`] converts a mono stream between two rates. Interleaved
//! multi-channel conversion is deliberately unsupported.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::error::ResampleError;

/// Streaming mono sample-rate converter.
///
/// Input is buffered into fixed 10 ms blocks internally, so `convert` accepts
/// slices of any length. Output counts are whatever the converter reports for
/// each block, never a value computed from the ratio.
pub struct RateAdapter {
    inner: FastFixedIn<f32>,
    in_rate: u32,
    out_rate: u32,
    /// Input frames consumed per process call
    block: usize,
    /// Carry-over input shorter than one block
    pending: Vec<f32>,
}

impl RateAdapter {
    /// Fails with a capability error for anything but mono input.
    pub fn new(channels: u8, in_rate: u32, out_rate: u32) -> Result<Self, ResampleError> {
        if channels != 1 {
            // Interleaved conversion would need per-channel de-interleaving;
            // the stream-level contract is mono only.
            return Err(ResampleError::UnsupportedChannels(channels));
        }
        if in_rate == 0 || out_rate == 0 {
            return Err(ResampleError::UnsupportedRate { in_rate, out_rate });
        }

        let block = (in_rate / 100) as usize;
        let inner = FastFixedIn::new(
            out_rate as f64 / in_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            block,
            1,
        )
        .map_err(|e| ResampleError::Converter(e.to_string()))?;

        Ok(Self {
            inner,
            in_rate,
            out_rate,
            block,
            pending: Vec::with_capacity(block),
        })
    }

    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Convert as much of `input` as fills whole blocks; the rest is carried
    /// over to the next call.
    pub fn convert(&mut self, input: &[f32]) -> Result<Vec<f32>, ResampleError> {
        self.pending.extend_from_slice(input);

        let mut out = Vec::new();
        while self.pending.len() >= self.block {
            let block: Vec<f32> = self.pending.drain(..self.block).collect();
            let mut produced = self
                .inner
                .process(&[block], None)
                .map_err(|e| ResampleError::Converter(e.to_string()))?;
            out.append(&mut produced[0]);
        }
        Ok(out)
    }

    /// End of stream: pad the carried remainder out to a block and drain the
    /// converter's internal delay line.
    pub fn flush(&mut self) -> Result<Vec<f32>, ResampleError> {
        let mut out = Vec::new();

        if !self.pending.is_empty() {
            let tail: Vec<f32> = std::mem::take(&mut self.pending);
            let mut produced = self
                .inner
                .process_partial(Some(&[tail]), None)
                .map_err(|e| ResampleError::Converter(e.to_string()))?;
            out.append(&mut produced[0]);
        }

        let mut drained = self
            .inner
            .process_partial(Option::<&[Vec<f32>]>::None, None)
            .map_err(|e| ResampleError::Converter(e.to_string()))?;
        out.append(&mut drained[0]);

        Ok(out)
    }
}

/// One-shot conversion of a complete mono signal.
pub fn convert_once(
    channels: u8,
    in_rate: u32,
    out_rate: u32,
    samples: &[f32],
) -> Result<Vec<f32>, ResampleError> {
    let mut adapter = RateAdapter::new(channels, in_rate, out_rate)?;
    let mut out = adapter.convert(samples)?;
    out.extend(adapter.flush()?);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_multi_channel() {
        assert!(matches!(
            RateAdapter::new(2, 44100, 24000),
            Err(ResampleError::UnsupportedChannels(2))
        ));
        assert!(matches!(
            convert_once(2, 44100, 24000, &[0.0; 1024]),
            Err(ResampleError::UnsupportedChannels(2))
        ));
    }

    #[test]
    fn test_44100_to_24000_count() {
        // One second of a 440 Hz tone.
        let input: Vec<f32> = (0..44100)
            .map(|i| (i as f32 * 440.0 * 2.0 * std::f32::consts::PI / 44100.0).sin() * 0.5)
            .collect();

        let out = convert_once(1, 44100, 24000, &input).unwrap();

        // Expect L * 24000/44100 within one 10 ms frame of slack for the
        // converter's block padding and delay line.
        let expected = input.len() * 24000 / 44100;
        let tolerance = 240 + 240;
        assert!(
            (out.len() as i64 - expected as i64).unsigned_abs() as usize <= tolerance,
            "got {} samples, expected about {}",
            out.len(),
            expected
        );
    }

    #[test]
    fn test_streaming_matches_ratio() {
        let mut adapter = RateAdapter::new(1, 48000, 24000).unwrap();

        // Feed in uneven slices; only whole 10 ms blocks produce output.
        let mut produced = 0usize;
        let chunk = vec![0.0f32; 313];
        let mut fed = 0usize;
        for _ in 0..100 {
            produced += adapter.convert(&chunk).unwrap().len();
            fed += chunk.len();
        }
        produced += adapter.flush().unwrap().len();

        let expected = fed / 2;
        assert!(
            (produced as i64 - expected as i64).unsigned_abs() as usize <= 480,
            "got {produced}, expected about {expected}"
        );
    }
}
