//! Audio Sender Application
//!
//! Captures the default input device, encodes 10 ms Opus frames, and
//! publishes them on the relay topic until the run duration elapses.
//! Exits non-zero on any setup or fatal encode failure.

use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opuscast::{
    audio::{buffer::create_shared_queue, capture::CaptureStream},
    config::AppConfig,
    constants::CHUNK_QUEUE_CAPACITY,
    pipeline::{SenderPipeline, SenderSession},
    transport::TcpPublisher,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting audio sender");

    // Defaults, then config file, then positional overrides:
    //   sender [relay_addr] [topic] [duration_secs]
    let mut config = match std::env::var("OPUSCAST_CONFIG") {
        Ok(path) => AppConfig::from_path(path)?,
        Err(_) => AppConfig::default(),
    };
    let mut args = std::env::args().skip(1);
    if let Some(addr) = args.next() {
        config.relay.address = addr;
    }
    if let Some(topic) = args.next() {
        config.relay.topic = topic;
    }
    if let Some(duration) = args.next() {
        config.session.send_duration_secs = duration.parse()?;
    }

    // Setup order matters: every constructor below fails the whole run, so
    // no partial pipeline can start capturing.
    let queue = create_shared_queue(CHUNK_QUEUE_CAPACITY);
    let mut capture = CaptureStream::open(queue.clone())?;
    let session = SenderSession::new(capture.stream_format())?;
    let publisher = TcpPublisher::connect(&config.relay.address[..], &config.relay.topic)?;

    capture.start()?;
    tracing::info!(
        "Streaming to {} (topic '{}') for {} s",
        config.relay.address,
        config.relay.topic,
        config.session.send_duration_secs
    );

    let cancel = AtomicBool::new(false);
    let mut pipeline = SenderPipeline::new(session, publisher, queue);
    let stats = pipeline.run(
        Duration::from_secs(config.session.send_duration_secs),
        &cancel,
    )?;

    capture.stop();
    if let Some(e) = capture.check_errors() {
        tracing::warn!("Capture reported: {e}");
    }

    tracing::info!(
        "Sent {} packets (last frame index {})",
        stats.packets_published,
        stats.last_frame_index
    );
    Ok(())
}
