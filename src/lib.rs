//! # opuscast
//!
//! Low-latency one-way audio broadcasting over a lightweight pub/sub relay.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────── SENDER ────────────────────────────┐
//! │  ┌────────────┐   ┌──────────────────┐   ┌─────────────────┐  │
//! │  │  Capture   │──▶│ FrameAccumulator │──▶│   RateAdapter   │  │
//! │  │  (cpal)    │   │  (10 ms frames)  │   │ (off-tier only) │  │
//! │  └────────────┘   └──────────────────┘   └────────┬────────┘  │
//! │                                                   │           │
//! │                      ┌────────────┐   ┌───────────▼────────┐  │
//! │                      │ PacketCodec│◀──│    Opus Encoder    │  │
//! │                      └──────┬─────┘   └────────────────────┘  │
//! └─────────────────────────────┼─────────────────────────────────┘
//!                               │ publish(topic, packet)
//!                       ┌───────▼───────┐
//!                       │     Relay     │  best-effort fan-out,
//!                       │ (topic-based) │  no ordering guarantee
//!                       └───────┬───────┘
//!                               │ subscribe(topic)
//! ┌─────────────────────────────┼────────────────────────────────┐
//! │  ┌────────────┐   ┌─────────▼─────┐   ┌───────────────────┐  │
//! │  │  WAV sink  │◀──│ Opus Decoder  │◀──│    PacketCodec    │  │
//! │  │  (hound)   │   │ (+concealment)│   │  (self-describing)│  │
//! │  └────────────┘   └───────────────┘   └───────────────────┘  │
//! └──────────────────────────── RECEIVER ────────────────────────┘
//! ```
//!
//! The sender accumulates irregular capture buffers into exact 10 ms frames,
//! bridges off-tier sample rates to a codec-supported rate, and publishes one
//! self-describing packet per encoded frame. Any receiver can join mid-stream:
//! every packet carries the full header, so no session handshake exists. Lost
//! packets are masked with the codec's concealment path.

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod offline;
pub mod pipeline;
pub mod protocol;
pub mod transport;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Duration of one codec frame in milliseconds
    pub const FRAME_DURATION_MS: u32 = 10;

    /// Sample rates the codec accepts natively
    pub const CODEC_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

    /// Canonical target for sources that need rate conversion
    pub const FALLBACK_SAMPLE_RATE: u32 = 24000;

    /// Most channels a session may carry
    pub const MAX_CHANNELS: u8 = 2;

    /// Upper bound for a single encoded Opus frame
    pub const MAX_OPUS_PAYLOAD: usize = 4000;

    /// Upper bound for one transport message (header + payload)
    pub const MAX_MESSAGE_LEN: usize = 64 * 1024;

    /// Capture chunk queue capacity (in device callbacks)
    pub const CHUNK_QUEUE_CAPACITY: usize = 256;

    /// Longest run of missing frames bridged with concealment
    pub const MAX_CONCEALED_FRAMES: u16 = 50;

    /// Default broadcast topic
    pub const DEFAULT_TOPIC: &str = "convo";

    /// Default relay listen port
    pub const DEFAULT_RELAY_PORT: u16 = 7400;

    /// Returns true when the codec accepts `rate` without conversion.
    pub fn is_codec_rate(rate: u32) -> bool {
        CODEC_SAMPLE_RATES.contains(&rate)
    }
}
