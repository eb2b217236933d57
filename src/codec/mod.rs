//! Opus codec wrappers
//!
//! Fixed 10 ms frame policy on top of the raw codec: encode failures on tail
//! fragments end the stream cleanly, lost packets decode through the codec's
//! concealment path.

pub mod decoder;
pub mod encoder;

pub use decoder::AudioDecoder;
pub use encoder::{AudioEncoder, EncodeOutcome};

use crate::constants::{is_codec_rate, FALLBACK_SAMPLE_RATE};

/// Rate the codec actually runs at for a stream captured at `source_rate`.
///
/// Tier rates pass through; everything else is bridged to the canonical
/// fallback tier before encoding, so a receiver can derive the decode rate
/// from the advertised capture rate alone.
pub fn operating_rate(source_rate: u32) -> u32 {
    if is_codec_rate(source_rate) {
        source_rate
    } else {
        FALLBACK_SAMPLE_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operating_rate() {
        assert_eq!(operating_rate(48000), 48000);
        assert_eq!(operating_rate(8000), 8000);
        assert_eq!(operating_rate(44100), 24000);
        assert_eq!(operating_rate(96000), 24000);
    }
}
