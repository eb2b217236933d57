//! Receiver pipeline
//!
//! Blocking subscribe -> deserialize -> decode -> persist loop, run on a
//! dedicated thread so the controller can cancel it from outside by closing
//! the subscription handle. Framing corruption ends the session with an
//! error; a single bad packet does not.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::codec::{operating_rate, AudioDecoder};
use crate::constants::MAX_CONCEALED_FRAMES;
use crate::error::{Error, Result};
use crate::protocol::{self, PacketHeader};
use crate::transport::{Receive, Subscription, SubscriptionHandle};

/// Destination for decoded PCM. `start` is called once, on the first packet,
/// when the stream's rate and channel count become known.
pub trait PcmSink {
    fn start(&mut self, sample_rate: u32, channels: u8) -> Result<()>;
    fn append(&mut self, samples: &[i16]) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// 16-bit PCM WAV file sink
pub struct WavSink {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    /// Nothing is written until the first packet arrives.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
        }
    }
}

impl PcmSink for WavSink {
    fn start(&mut self, sample_rate: u32, channels: u8) -> Result<()> {
        let spec = hound::WavSpec {
            channels: u16::from(channels),
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&self.path, spec)
            .map_err(|e| Error::Config(format!("cannot create {}: {e}", self.path.display())))?;
        self.writer = Some(writer);
        Ok(())
    }

    fn append(&mut self, samples: &[i16]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Config("sink not started".to_string()))?;
        for &s in samples {
            writer
                .write_sample(s)
                .map_err(|e| Error::Config(format!("WAV write failed: {e}")))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| Error::Config(format!("WAV finalize failed: {e}")))?;
        }
        Ok(())
    }
}

/// In-memory sink for tests and embedding
#[derive(Default)]
pub struct MemorySink {
    pub sample_rate: u32,
    pub channels: u8,
    pub samples: Vec<i16>,
}

impl PcmSink for MemorySink {
    fn start(&mut self, sample_rate: u32, channels: u8) -> Result<()> {
        self.sample_rate = sample_rate;
        self.channels = channels;
        Ok(())
    }

    fn append(&mut self, samples: &[i16]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receiver statistics
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    pub packets_received: u64,
    pub frames_decoded: u64,
    pub frames_concealed: u64,
    pub decode_failures: u64,
    pub late_packets: u64,
    pub resyncs: u64,
}

/// Subscribe -> decode -> persist loop over any message source
pub struct ReceiverPipeline<R: Receive, S: PcmSink> {
    source: R,
    sink: S,
    decoder: Option<AudioDecoder>,
    session_header: Option<PacketHeader>,
    last_index: Option<u16>,
    stats: ReceiverStats,
}

impl<R: Receive, S: PcmSink> ReceiverPipeline<R, S> {
    pub fn new(source: R, sink: S) -> Self {
        Self {
            source,
            sink,
            decoder: None,
            session_header: None,
            last_index: None,
            stats: ReceiverStats::default(),
        }
    }

    /// Run until the source closes (normal) or fails. Returns the stats and
    /// the sink, finalized.
    pub fn run(mut self) -> Result<(ReceiverStats, S)> {
        while let Some(message) = self.source.receive()? {
            self.stats.packets_received += 1;

            // Framing integrity is all-or-nothing: a malformed packet means
            // byte boundaries can no longer be trusted.
            let (header, payload) = protocol::deserialize(&message)?;

            if self.decoder.is_none() {
                let rate = operating_rate(header.sample_rate);
                tracing::info!(
                    "Stream: {} Hz advertised, decoding at {rate} Hz, {} channel(s)",
                    header.sample_rate,
                    header.channels
                );
                self.decoder = Some(AudioDecoder::new(rate, header.channels)?);
                self.session_header = Some(header);
                self.sink.start(rate, header.channels)?;
            } else if let Some(first) = self.session_header {
                // The codec cannot change rate or layout mid-session.
                if first.sample_rate != header.sample_rate || first.channels != header.channels {
                    tracing::warn!(
                        "Frame {} advertises {} Hz/{}ch, session is {} Hz/{}ch; skipping",
                        header.frame_index,
                        header.sample_rate,
                        header.channels,
                        first.sample_rate,
                        first.channels
                    );
                    continue;
                }
            }
            let decoder = match self.decoder.as_mut() {
                Some(d) => d,
                None => continue,
            };

            // Gap handling by wrapping distance from the expected index.
            if let Some(last) = self.last_index {
                let expected = last.wrapping_add(1);
                let gap = header.frame_index.wrapping_sub(expected);
                if gap == 0 {
                    // In order.
                } else if gap <= MAX_CONCEALED_FRAMES {
                    tracing::debug!(
                        "Lost {gap} frame(s) before {}, concealing",
                        header.frame_index
                    );
                    for _ in 0..gap {
                        match decoder.decode(None) {
                            Ok(samples) => {
                                self.stats.frames_concealed += 1;
                                self.sink.append(&samples)?;
                            }
                            Err(e) => {
                                self.stats.decode_failures += 1;
                                tracing::warn!("Concealment failed: {e}");
                            }
                        }
                    }
                } else if gap >= 0x8000 {
                    // Behind the stream: appending it would double-count
                    // time already reconstructed.
                    self.stats.late_packets += 1;
                    tracing::debug!("Late frame {} dropped", header.frame_index);
                    continue;
                } else {
                    tracing::warn!(
                        "Index jumped from {last} to {}; resyncing",
                        header.frame_index
                    );
                    self.stats.resyncs += 1;
                }
            }
            self.last_index = Some(header.frame_index);

            match decoder.decode(Some(payload)) {
                Ok(samples) => {
                    self.stats.frames_decoded += 1;
                    self.sink.append(&samples)?;
                }
                Err(e) => {
                    // One bad payload is recoverable; the next packet will
                    // resynchronize the codec.
                    self.stats.decode_failures += 1;
                    tracing::warn!("Failed to decode frame {}: {e}", header.frame_index);
                }
            }
        }

        self.sink.finish()?;
        tracing::info!(
            "Receiver closed: {} packets, {} decoded, {} concealed, {} failures",
            self.stats.packets_received,
            self.stats.frames_decoded,
            self.stats.frames_concealed,
            self.stats.decode_failures
        );
        Ok((self.stats, self.sink))
    }
}

/// Runs a [`ReceiverPipeline`] on a dedicated thread and cancels it by
/// force-closing the subscription from the controlling thread — the
/// transport's read primitive has no cooperative cancel of its own.
pub struct ReceiverController<S: PcmSink + Send + 'static> {
    handle: SubscriptionHandle,
    join: JoinHandle<Result<(ReceiverStats, S)>>,
}

impl<S: PcmSink + Send + 'static> ReceiverController<S> {
    pub fn spawn(subscription: Subscription, sink: S) -> Result<Self> {
        let handle = subscription.handle();
        let join = thread::Builder::new()
            .name("receiver".to_string())
            .spawn(move || ReceiverPipeline::new(subscription, sink).run())
            .map_err(Error::Io)?;
        Ok(Self { handle, join })
    }

    /// Handle for cancelling from anywhere
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Cancel and collect. The forced closure surfaces to the pipeline as a
    /// normal end of stream.
    pub fn stop(self) -> Result<(ReceiverStats, S)> {
        self.handle.close();
        self.join.join().map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "receiver thread panicked",
            ))
        })?
    }

    /// Let the session run for `duration`, then cancel it.
    pub fn run_for(self, duration: Duration) -> Result<(ReceiverStats, S)> {
        thread::sleep(duration);
        self.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleFormat;
    use crate::codec::{AudioEncoder, EncodeOutcome};
    use crate::error::TransportError;
    use bytes::Bytes;
    use std::collections::VecDeque;

    /// Replays a fixed message sequence, then reports closure.
    struct ScriptedSource {
        messages: VecDeque<Bytes>,
    }

    impl ScriptedSource {
        fn new(messages: Vec<Bytes>) -> Self {
            Self {
                messages: messages.into(),
            }
        }
    }

    impl Receive for ScriptedSource {
        fn receive(&mut self) -> std::result::Result<Option<Bytes>, TransportError> {
            Ok(self.messages.pop_front())
        }
    }

    /// Encode `count` frames of a quiet tone and wrap them as wire messages
    /// with consecutive indices starting at 1.
    fn packets(count: u16) -> Vec<Bytes> {
        let mut encoder = AudioEncoder::new(24000, 1, SampleFormat::I16).unwrap();
        let frame: Vec<i16> = (0..encoder.samples_per_frame())
            .map(|i| ((i as f32 * 0.1).sin() * 2000.0) as i16)
            .collect();

        (1..=count)
            .map(|index| {
                let payload = match encoder.encode_i16(&frame).unwrap() {
                    EncodeOutcome::Packet(p) => p,
                    EncodeOutcome::EndOfStream => unreachable!("full frame"),
                };
                let header = PacketHeader {
                    payload_len: payload.len() as u32,
                    sample_rate: 24000,
                    frame_index: index,
                    channels: 1,
                    reserved: 0,
                };
                protocol::serialize(&header, &payload)
            })
            .collect()
    }

    #[test]
    fn test_contiguous_stream_decodes_fully() {
        let messages = packets(5);
        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        let (stats, sink) = pipeline.run().unwrap();

        assert_eq!(stats.frames_decoded, 5);
        assert_eq!(stats.frames_concealed, 0);
        assert_eq!(sink.sample_rate, 24000);
        assert_eq!(sink.samples.len(), 5 * 240);
    }

    #[test]
    fn test_gap_triggers_one_concealment() {
        // Frames 1 and 3; frame 2 lost in transit.
        let mut messages = packets(3);
        messages.remove(1);

        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        let (stats, sink) = pipeline.run().unwrap();

        assert_eq!(stats.frames_concealed, 1);
        assert_eq!(stats.frames_decoded, 2);
        // Output length stays within one frame of the lossless total.
        let lossless = 3 * 240;
        assert!((sink.samples.len() as i64 - lossless as i64).unsigned_abs() <= 240);
    }

    #[test]
    fn test_late_packet_is_skipped() {
        let mut messages = packets(3);
        let replay = messages[1].clone();
        messages.push(replay);

        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        let (stats, sink) = pipeline.run().unwrap();

        assert_eq!(stats.late_packets, 1);
        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(sink.samples.len(), 3 * 240);
    }

    #[test]
    fn test_bad_payload_does_not_end_session() {
        let mut messages = packets(3);
        // Replace frame 2's payload with an illegal packet: code 3 with a
        // frame count whose total duration exceeds the codec's 120 ms cap.
        let bogus_payload = [0x03u8, 0x3f];
        let header = PacketHeader {
            payload_len: bogus_payload.len() as u32,
            sample_rate: 24000,
            frame_index: 2,
            channels: 1,
            reserved: 0,
        };
        messages[1] = protocol::serialize(&header, &bogus_payload);

        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        let (stats, sink) = pipeline.run().unwrap();

        // The session survived and the following frame still decoded.
        assert_eq!(stats.packets_received, 3);
        assert!(stats.frames_decoded >= 2);
        assert!(sink.samples.len() >= 2 * 240);
    }

    #[test]
    fn test_malformed_framing_is_fatal() {
        let mut messages = packets(2);
        messages[1] = Bytes::from_static(&[1, 2, 3]);

        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        assert!(pipeline.run().is_err());
    }

    #[test]
    fn test_wrapping_indices_are_in_order() {
        // Re-index three frames as 65535, 0, 1: wrapping, no gap.
        let messages: Vec<Bytes> = packets(3)
            .iter()
            .zip([65535u16, 0, 1])
            .map(|(message, index)| {
                let (mut header, payload) = protocol::deserialize(message).unwrap();
                header.frame_index = index;
                protocol::serialize(&header, payload)
            })
            .collect();

        let pipeline = ReceiverPipeline::new(ScriptedSource::new(messages), MemorySink::default());
        let (stats, _) = pipeline.run().unwrap();
        assert_eq!(stats.frames_decoded, 3);
        assert_eq!(stats.frames_concealed, 0);
        assert_eq!(stats.late_packets, 0);
    }
}
