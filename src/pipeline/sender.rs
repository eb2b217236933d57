//! Sender pipeline
//!
//! Orchestrates capture -> accumulate -> (resample) -> encode -> publish.
//! One [`SenderSession`] spans pipeline start to stop and owns the codec
//! instance, the accumulator, and the frame counter; dropping it releases
//! everything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::buffer::SharedChunkQueue;
use crate::audio::format::{bytes_to_f32, bytes_to_i16, SampleFormat, StreamFormat};
use crate::audio::frame::FrameAccumulator;
use crate::audio::resample::RateAdapter;
use crate::codec::{operating_rate, AudioEncoder, EncodeOutcome};
use crate::constants::FRAME_DURATION_MS;
use crate::error::Result;
use crate::protocol::{self, PacketHeader};
use crate::transport::Publish;

/// Wraps each encoded frame in a packet and hands it to the transport.
///
/// The frame counter is incremented exactly once per successful encode; a
/// publish failure is logged and never rolls it back, so `frame_index` stays
/// the authoritative ordering signal for receivers.
struct Packetizer {
    sample_rate: u32,
    channels: u8,
    frame_index: u16,
    packets_published: u64,
    publish_failures: u64,
}

impl Packetizer {
    fn new(sample_rate: u32, channels: u8) -> Self {
        Self {
            sample_rate,
            channels,
            frame_index: 0,
            packets_published: 0,
            publish_failures: 0,
        }
    }

    /// Returns true when the encoder reported end of stream.
    fn emit<P: Publish>(&mut self, outcome: EncodeOutcome, publisher: &mut P) -> bool {
        let payload = match outcome {
            EncodeOutcome::Packet(payload) => payload,
            EncodeOutcome::EndOfStream => return true,
        };

        self.frame_index = self.frame_index.wrapping_add(1);
        let header = PacketHeader {
            payload_len: payload.len() as u32,
            sample_rate: self.sample_rate,
            frame_index: self.frame_index,
            channels: self.channels,
            reserved: 0,
        };
        let message = protocol::serialize(&header, &payload);

        match publisher.publish(&message) {
            Ok(()) => {
                self.packets_published += 1;
                tracing::trace!(
                    "Published frame {} ({} bytes)",
                    self.frame_index,
                    message.len()
                );
            }
            Err(e) => {
                self.publish_failures += 1;
                tracing::warn!("Failed to publish frame {}: {e}", self.frame_index);
            }
        }
        false
    }
}

/// Sender-side session state
pub struct SenderSession {
    format: StreamFormat,
    accumulator: FrameAccumulator,
    /// Present only when the capture rate is off-tier
    resampler: Option<RateAdapter>,
    /// Resampled samples not yet forming a full encoder frame
    pending: Vec<f32>,
    encoder: AudioEncoder,
    packets: Packetizer,
    ended: bool,
}

impl SenderSession {
    /// Build the whole encode chain up front. Any failure here aborts the
    /// pipeline; nothing partial ever runs.
    pub fn new(format: StreamFormat) -> Result<Self> {
        format.validate()?;

        let encode_rate = operating_rate(format.sample_rate);
        let resampler = if encode_rate == format.sample_rate {
            None
        } else {
            Some(RateAdapter::new(
                format.channels,
                format.sample_rate,
                encode_rate,
            )?)
        };

        // The resampled path always feeds the encoder floats.
        let encode_format = if resampler.is_some() {
            SampleFormat::F32
        } else {
            format.sample_format
        };
        let encoder = AudioEncoder::new(encode_rate, format.channels, encode_format)?;

        tracing::info!(
            "Sender session: {} Hz capture, encoding at {} Hz, {} channel(s)",
            format.sample_rate,
            encode_rate,
            format.channels
        );

        Ok(Self {
            accumulator: FrameAccumulator::new(format.frame_bytes()),
            resampler,
            pending: Vec::new(),
            encoder,
            packets: Packetizer::new(format.sample_rate, format.channels),
            format,
            ended: false,
        })
    }

    /// Feed one capture chunk through the pipeline, publishing every full
    /// frame it completes.
    pub fn ingest<P: Publish>(&mut self, chunk: &[u8], publisher: &mut P) -> Result<()> {
        let mut session = self.accumulator.feed(chunk);
        loop {
            // Acquire one exact frame; encode it (or resample it) while the
            // bytes are still borrowed, then release and dispatch.
            let (source, len, step) = match session.try_acquire() {
                None => break,
                Some(frame) => {
                    let source = frame.source;
                    let len = frame.bytes.len();
                    let step = match self.resampler.as_mut() {
                        Some(adapter) => {
                            let samples = frame_to_f32(self.format.sample_format, frame.bytes);
                            Step::Resampled(adapter.convert(&samples)?)
                        }
                        None => Step::Direct(self.encoder.encode_bytes(frame.bytes)?),
                    };
                    (source, len, step)
                }
            };
            session.release(source, len);

            match step {
                Step::Direct(outcome) => {
                    if self.packets.emit(outcome, publisher) {
                        self.ended = true;
                        break;
                    }
                }
                Step::Resampled(converted) => {
                    self.pending.extend(converted);
                    let need = self.encoder.samples_per_frame();
                    while self.pending.len() >= need {
                        let frame: Vec<f32> = self.pending.drain(..need).collect();
                        let outcome = self.encoder.encode_f32(&frame)?;
                        if self.packets.emit(outcome, publisher) {
                            self.ended = true;
                            break;
                        }
                    }
                }
            }

            if self.ended {
                break;
            }
        }
        Ok(())
    }

    /// End of stream: flush the resampler, then try the sub-frame tail once.
    /// The codec refusing the tail is the expected clean ending.
    pub fn finish<P: Publish>(&mut self, publisher: &mut P) -> Result<()> {
        let tail = self.accumulator.take_remainder();

        if let Some(adapter) = self.resampler.as_mut() {
            if !tail.is_empty() {
                let samples = frame_to_f32(self.format.sample_format, &tail);
                self.pending.extend(adapter.convert(&samples)?);
            }
            self.pending.extend(adapter.flush()?);

            let need = self.encoder.samples_per_frame();
            while self.pending.len() >= need {
                let frame: Vec<f32> = self.pending.drain(..need).collect();
                let outcome = self.encoder.encode_f32(&frame)?;
                if self.packets.emit(outcome, publisher) {
                    return Ok(());
                }
            }
            if !self.pending.is_empty() {
                let rest: Vec<f32> = self.pending.drain(..).collect();
                let outcome = self.encoder.encode_f32(&rest)?;
                self.packets.emit(outcome, publisher);
            }
        } else if !tail.is_empty() {
            let outcome = self.encoder.encode_bytes(&tail)?;
            self.packets.emit(outcome, publisher);
        }
        Ok(())
    }

    /// Capture-side format this session was built for
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn stats(&self) -> SenderStats {
        SenderStats {
            frames_encoded: self.encoder.stats().frames_encoded,
            packets_published: self.packets.packets_published,
            publish_failures: self.packets.publish_failures,
            last_frame_index: self.packets.frame_index,
        }
    }

    #[cfg(test)]
    pub(crate) fn set_frame_index(&mut self, index: u16) {
        self.packets.frame_index = index;
    }
}

enum Step {
    Direct(EncodeOutcome),
    Resampled(Vec<f32>),
}

fn frame_to_f32(format: SampleFormat, bytes: &[u8]) -> Vec<f32> {
    match format {
        SampleFormat::F32 => bytes_to_f32(bytes),
        SampleFormat::I16 => bytes_to_i16(bytes)
            .into_iter()
            .map(|s| f32::from(s) / 32768.0)
            .collect(),
    }
}

/// Sender statistics
#[derive(Debug, Clone)]
pub struct SenderStats {
    pub frames_encoded: u64,
    pub packets_published: u64,
    pub publish_failures: u64,
    pub last_frame_index: u16,
}

/// Time-bounded capture -> publish loop
pub struct SenderPipeline<P: Publish> {
    session: SenderSession,
    publisher: P,
    queue: SharedChunkQueue,
}

impl<P: Publish> SenderPipeline<P> {
    pub fn new(session: SenderSession, publisher: P, queue: SharedChunkQueue) -> Self {
        Self {
            session,
            publisher,
            queue,
        }
    }

    /// Run until the deadline or external cancellation. Sleeps half a frame
    /// per iteration to bound latency without busy-polling, then drains all
    /// capture data currently queued.
    pub fn run(&mut self, run_for: Duration, cancel: &AtomicBool) -> Result<SenderStats> {
        let deadline = Instant::now() + run_for;
        let pace = Duration::from_millis(u64::from(FRAME_DURATION_MS) / 2);

        while Instant::now() < deadline && !cancel.load(Ordering::Relaxed) {
            thread::sleep(pace);

            while let Some(block) = self.queue.pop() {
                self.session.ingest(&block.bytes, &mut self.publisher)?;
            }
        }

        self.session.finish(&mut self.publisher)?;

        let stats = self.session.stats();
        tracing::info!(
            "Sender done: {} frames encoded, {} packets published, {} publish failures",
            stats.frames_encoded,
            stats.packets_published,
            stats.publish_failures
        );
        Ok(stats)
    }

    pub fn session(&self) -> &SenderSession {
        &self.session
    }
}
