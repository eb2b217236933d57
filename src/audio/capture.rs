//! Audio capture from the default input device
//!
//! The capture stream runs in its own dedicated thread; device buffers are
//! copied into the shared chunk queue inside the callback, before the
//! hardware memory is recycled.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::buffer::{CaptureBlock, SharedChunkQueue};
use crate::audio::format::{f32_to_bytes, i16_to_bytes, SampleFormat, StreamFormat};
use crate::error::AudioError;

/// Capture binding for the default input device
pub struct CaptureStream {
    /// Negotiated device format, fixed for the stream's lifetime
    stream_format: StreamFormat,

    /// Whether capture is running
    running: Arc<AtomicBool>,

    /// Destination for captured blocks
    queue: SharedChunkQueue,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Channel for stream errors
    error_rx: Option<Receiver<AudioError>>,
}

impl CaptureStream {
    /// Negotiate the default input device's native format. Fails fast on
    /// anything the pipeline cannot carry; nothing is opened yet.
    pub fn open(queue: SharedChunkQueue) -> Result<Self, AudioError> {
        let device = default_input_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| AudioError::CaptureDevice(e.to_string()))?;

        let sample_format = match default_config.sample_format() {
            cpal::SampleFormat::F32 => SampleFormat::F32,
            cpal::SampleFormat::I16 => SampleFormat::I16,
            other => {
                return Err(AudioError::UnsupportedFormat(format!(
                    "{other:?} samples (supported: f32, i16)"
                )))
            }
        };

        let channels = default_config.channels();
        if channels == 0 || channels > 2 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{channels} channels (supported: 1 or 2)"
            )));
        }

        let stream_format = StreamFormat::new(
            default_config.sample_rate().0,
            channels as u8,
            sample_format,
        );
        stream_format.validate()?;

        tracing::info!(
            "Capture format: {} Hz, {} channels, {:?}",
            stream_format.sample_rate,
            stream_format.channels,
            stream_format.sample_format
        );

        Ok(Self {
            stream_format,
            running: Arc::new(AtomicBool::new(false)),
            queue,
            thread_handle: None,
            error_rx: None,
        })
    }

    /// Start capturing audio
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (error_tx, error_rx) = bounded::<AudioError>(16);
        self.error_rx = Some(error_rx);

        let running = self.running.clone();
        let running_for_loop = self.running.clone();
        let queue = self.queue.clone();
        let sample_format = self.stream_format.sample_format;

        running.store(true, Ordering::SeqCst);

        let handle = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || {
                let device = match default_input_device() {
                    Ok(d) => d,
                    Err(e) => {
                        let _ = error_tx.try_send(e);
                        return;
                    }
                };
                let config = match device.default_input_config() {
                    Ok(c) => c.config(),
                    Err(e) => {
                        let _ = error_tx.try_send(AudioError::CaptureDevice(e.to_string()));
                        return;
                    }
                };

                let err_tx = error_tx.clone();
                let err_cb = move |err: cpal::StreamError| {
                    let _ = err_tx.try_send(AudioError::Stream(err.to_string()));
                };

                // One arm per supported sample format; each callback copies
                // the device buffer out as little-endian bytes before it is
                // returned to the hardware.
                let stream = match sample_format {
                    SampleFormat::F32 => {
                        let running = running.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                                if running.load(Ordering::Relaxed) {
                                    let _ = queue.push(CaptureBlock::new(f32_to_bytes(data)));
                                }
                            },
                            err_cb,
                            None,
                        )
                    }
                    SampleFormat::I16 => {
                        let running = running.clone();
                        device.build_input_stream(
                            &config,
                            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                                if running.load(Ordering::Relaxed) {
                                    let _ = queue.push(CaptureBlock::new(i16_to_bytes(data)));
                                }
                            },
                            err_cb,
                            None,
                        )
                    }
                };

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = error_tx.try_send(AudioError::Stream(e.to_string()));
                            return;
                        }

                        // Keep thread alive while running
                        while running_for_loop.load(Ordering::Relaxed) {
                            thread::sleep(std::time::Duration::from_millis(10));
                        }

                        // Stream is dropped here, stopping capture
                    }
                    Err(e) => {
                        let _ = error_tx.try_send(AudioError::Stream(e.to_string()));
                    }
                }
            })
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Negotiated stream format
    pub fn stream_format(&self) -> StreamFormat {
        self.stream_format
    }

    /// Check for errors reported by the stream thread
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn default_input_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| AudioError::CaptureDevice("no default input device".to_string()))
}
