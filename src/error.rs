//! Error types for the audio broadcasting pipeline

use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Resample error: {0}")]
    Resample(#[from] ResampleError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture-side errors. Format problems are detected at setup and never
/// surface mid-stream.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Capture device error: {0}")]
    CaptureDevice(String),

    #[error("Failed to open stream: {0}")]
    Stream(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Sample-rate conversion errors
#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("Interleaved conversion of {0} channels is unsupported (mono only)")]
    UnsupportedChannels(u8),

    #[error("Cannot convert between {in_rate} Hz and {out_rate} Hz")]
    UnsupportedRate { in_rate: u32, out_rate: u32 },

    #[error("Converter error: {0}")]
    Converter(String),
}

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Invalid frame size: {0} samples")]
    InvalidFrameSize(usize),
}

/// Wire packet errors. Both variants mean the byte stream cannot be trusted
/// past this point.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Truncated packet header: {actual} of {expected} bytes")]
    TruncatedHeader { expected: usize, actual: usize },

    #[error("Payload length {declared} exceeds remaining {available} bytes")]
    PayloadOutOfBounds { declared: usize, available: usize },
}

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Publish failed: {0}")]
    Send(String),

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Message of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
