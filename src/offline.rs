//! Offline round-trip stream files
//!
//! A packet stream with the transport removed, for testing the encode and
//! decode chains against real files: a `u32` little-endian stream rate
//! followed by repeated `(u32 record length, record)` entries, each record
//! one serialized packet. [`PacketFileWriter`] and [`PacketFileReader`]
//! implement the transport seams, so the sender session and receiver
//! pipeline run here unchanged.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bytes::Bytes;

use crate::audio::format::{f32_to_bytes, i16_to_bytes, SampleFormat, StreamFormat};
use crate::codec::operating_rate;
use crate::constants::MAX_MESSAGE_LEN;
use crate::error::{AudioError, Error, Result, TransportError};
use crate::pipeline::{ReceiverPipeline, ReceiverStats, SenderSession, WavSink};
use crate::transport::{Publish, Receive};

/// Writes a packet stream file
pub struct PacketFileWriter {
    writer: BufWriter<File>,
    records_written: u64,
}

impl PacketFileWriter {
    pub fn create(path: impl AsRef<Path>, stream_rate: u32) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&stream_rate.to_le_bytes())?;
        Ok(Self {
            writer,
            records_written: 0,
        })
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Publish for PacketFileWriter {
    fn publish(&mut self, message: &[u8]) -> std::result::Result<(), TransportError> {
        let len = (message.len() as u32).to_le_bytes();
        self.writer
            .write_all(&len)
            .and_then(|_| self.writer.write_all(message))
            .map_err(|e| TransportError::Send(e.to_string()))?;
        self.records_written += 1;
        Ok(())
    }
}

/// Reads a packet stream file, reporting a clean close at end of file
pub struct PacketFileReader {
    reader: BufReader<File>,
    stream_rate: u32,
}

impl PacketFileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut rate = [0u8; 4];
        reader.read_exact(&mut rate)?;
        Ok(Self {
            reader,
            stream_rate: u32::from_le_bytes(rate),
        })
    }

    /// Rate recorded in the stream header
    pub fn stream_rate(&self) -> u32 {
        self.stream_rate
    }
}

impl Receive for PacketFileReader {
    fn receive(&mut self) -> std::result::Result<Option<Bytes>, TransportError> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            // End of file at a record boundary is the normal close.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(TransportError::Receive(e.to_string())),
        }
        let len = u32::from_le_bytes(len) as usize;
        if len > MAX_MESSAGE_LEN {
            return Err(TransportError::Receive(format!(
                "record of {len} bytes exceeds limit"
            )));
        }
        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        Ok(Some(Bytes::from(body)))
    }
}

/// Summary of an offline encode
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub packets_written: u64,
    /// Rate the stream was encoded at (after any bridging)
    pub stream_rate: u32,
}

/// Compress a WAV file into a packet stream file.
pub fn encode_wav(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<EncodeReport> {
    let mut reader = hound::WavReader::open(input).map_err(from_hound)?;
    let spec = reader.spec();

    let (sample_format, bytes) = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => {
            let samples: std::result::Result<Vec<i16>, _> = reader.samples::<i16>().collect();
            (SampleFormat::I16, i16_to_bytes(&samples.map_err(from_hound)?))
        }
        (hound::SampleFormat::Float, 32) => {
            let samples: std::result::Result<Vec<f32>, _> = reader.samples::<f32>().collect();
            (SampleFormat::F32, f32_to_bytes(&samples.map_err(from_hound)?))
        }
        (format, bits) => {
            return Err(Error::Audio(AudioError::UnsupportedFormat(format!(
                "{bits}-bit {format:?} WAV (supported: 16-bit int, 32-bit float)"
            ))))
        }
    };

    let format = StreamFormat::new(spec.sample_rate, spec.channels as u8, sample_format);
    let stream_rate = operating_rate(format.sample_rate);

    let mut session = SenderSession::new(format)?;
    let mut writer = PacketFileWriter::create(output, stream_rate)?;

    session.ingest(&bytes, &mut writer)?;
    session.finish(&mut writer)?;

    let report = EncodeReport {
        packets_written: writer.records_written(),
        stream_rate,
    };
    writer.finish()?;
    tracing::info!(
        "Encoded {} packets at {} Hz",
        report.packets_written,
        report.stream_rate
    );
    Ok(report)
}

/// Decompress a packet stream file into a 16-bit PCM WAV file.
pub fn decode_to_wav(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<ReceiverStats> {
    let reader = PacketFileReader::open(input)?;
    let stream_rate = reader.stream_rate();

    let (stats, _sink) = ReceiverPipeline::new(reader, WavSink::create(output)).run()?;
    tracing::info!(
        "Decoded {} packets ({} Hz stream, {} frames concealed)",
        stats.packets_received,
        stream_rate,
        stats.frames_concealed
    );
    Ok(stats)
}

fn from_hound(e: hound::Error) -> Error {
    match e {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::Audio(AudioError::UnsupportedFormat(other.to_string())),
    }
}
